//! Remote feature queries and the feature type rendered by overlays.
//!
//! Overlays are populated from an ArcGIS-style feature service: one GET per
//! overlay with the entry's filter and field list, requesting GeoJSON
//! output. The response is converted into [`PlanAreaFeature`]s carrying the
//! requested attributes and a geographic multipolygon.

use std::collections::HashMap;

use galileo::layer::feature_layer::Feature;
use galileo_types::geo::impls::GeoPoint2d;
use galileo_types::geo::{GeoPoint, NewGeoPoint};
use galileo_types::impls::{ClosedContour, MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson};
use log::warn;

use crate::config::FeatureQuery;
use crate::error::PlanMapError;

/// Geometry of a plan area: one or more polygons in geographic coordinates.
pub type PlanAreaGeometry = MultiPolygon<GeoPoint2d>;

/// One plan-area feature: the attributes requested by the query plus its
/// polygon geometry.
#[derive(Debug, Clone)]
pub struct PlanAreaFeature {
    properties: HashMap<String, String>,
    geometry: PlanAreaGeometry,
}

impl PlanAreaFeature {
    /// Creates a feature from its attributes and geometry.
    pub fn new(properties: HashMap<String, String>, geometry: PlanAreaGeometry) -> Self {
        Self {
            properties,
            geometry,
        }
    }

    /// Value of the given attribute, if the query returned it.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

impl Feature for PlanAreaFeature {
    type Geom = PlanAreaGeometry;

    fn geometry(&self) -> &Self::Geom {
        &self.geometry
    }
}

/// Client for ArcGIS-style feature service endpoints.
#[derive(Debug, Clone, Default)]
pub struct FeatureService {
    client: reqwest::Client,
}

impl FeatureService {
    /// Creates a client with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes the query and parses the returned feature collection.
    ///
    /// The service is asked for geographic coordinates (`outSR=4326`) in
    /// GeoJSON form, so the response parses directly into layer features.
    pub async fn fetch(&self, query: &FeatureQuery) -> Result<Vec<PlanAreaFeature>, PlanMapError> {
        let out_fields = query.out_fields.join(",");
        let response = self
            .client
            .get(&query.url)
            .query(&[
                ("where", query.where_clause.as_str()),
                ("outFields", out_fields.as_str()),
                ("returnGeometry", "true"),
                ("outSR", "4326"),
                ("f", "geojson"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_features(&body, &query.out_fields)
    }
}

/// Parses a GeoJSON feature collection into plan-area features.
///
/// Properties are restricted to the requested fields and stringified.
/// Features without polygonal geometry are skipped with a warning; they
/// cannot be drawn by the overlay symbols.
pub fn parse_features(
    body: &str,
    fields: &[String],
) -> Result<Vec<PlanAreaFeature>, PlanMapError> {
    let collection = FeatureCollection::try_from(body.parse::<GeoJson>()?)?;

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let Some(geometry) = feature
            .geometry
            .as_ref()
            .and_then(|geometry| multi_polygon(&geometry.value))
        else {
            warn!("skipping feature without polygonal geometry");
            continue;
        };

        let mut properties = HashMap::new();
        for field in fields {
            if let Some(value) = feature.property(field).and_then(stringify) {
                properties.insert(field.clone(), value);
            }
        }

        features.push(PlanAreaFeature::new(properties, geometry));
    }

    Ok(features)
}

fn stringify(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn multi_polygon(value: &geojson::Value) -> Option<PlanAreaGeometry> {
    match value {
        geojson::Value::Polygon(rings) => Some(MultiPolygon::from(vec![polygon(rings)?])),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| polygon(rings))
            .collect::<Option<Vec<_>>>()
            .map(MultiPolygon::from),
        _ => None,
    }
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<GeoPoint2d>> {
    let mut contours = rings.iter().map(|ring| ring_contour(ring));
    let outer = contours.next()??;
    let inner = contours.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(outer, inner))
}

/// GeoJSON rings repeat the first position at the end; a closed contour
/// does not.
fn ring_contour(ring: &[Vec<f64>]) -> Option<ClosedContour<GeoPoint2d>> {
    let mut points = ring
        .iter()
        .map(|position| match position[..] {
            [lon, lat, ..] => Some(GeoPoint2d::latlon(lat, lon)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if points.len() > 1 {
        let (first, last) = (&points[0], &points[points.len() - 1]);
        if first.lat() == last.lat() && first.lon() == last.lon() {
            points.pop();
        }
    }

    if points.len() < 3 {
        return None;
    }

    Some(ClosedContour::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_POLYGON: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"cpname": "NORTH PARK", "objectid": 7},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-117.15, 32.73],
                    [-117.11, 32.73],
                    [-117.11, 32.76],
                    [-117.15, 32.76],
                    [-117.15, 32.73]
                ]]
            }
        }]
    }"#;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn parses_polygon_feature() {
        let features =
            parse_features(ONE_POLYGON, &fields(&["cpname"])).expect("fixture must parse");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].attribute("cpname"), Some("NORTH PARK"));
        // the closing position is dropped
        assert_eq!(features[0].geometry.parts()[0].outer_contour.points.len(), 4);
    }

    #[test]
    fn keeps_only_requested_fields() {
        let features =
            parse_features(ONE_POLYGON, &fields(&["objectid"])).expect("fixture must parse");
        assert_eq!(features[0].attribute("cpname"), None);
        assert_eq!(features[0].attribute("objectid"), Some("7"));
    }

    #[test]
    fn skips_non_polygonal_features() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"cpname": "SOMEWHERE"},
                "geometry": {"type": "Point", "coordinates": [-117.0, 32.7]}
            }]
        }"#;
        let features = parse_features(body, &fields(&["cpname"])).expect("fixture must parse");
        assert!(features.is_empty());
    }

    #[test]
    fn multi_polygon_geometry_keeps_all_parts() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                        [[[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 2.0]]]
                    ]
                }
            }]
        }"#;
        let features = parse_features(body, &[]).expect("fixture must parse");
        assert_eq!(features[0].geometry.parts().len(), 2);
    }

    #[test]
    fn malformed_body_is_a_decoding_error() {
        let err = parse_features("not geojson", &[]).expect_err("must fail");
        assert!(matches!(err, PlanMapError::Decoding(_)));
    }
}

//! Declarative description of the map contents.
//!
//! The whole viewer is driven by one [`MapConfig`] value: which basemaps
//! exist, which overlays are drawn over them, where their data comes from
//! and how they are styled and labeled. The built-in configuration
//! ([`MapConfig::north_park`]) describes the North Park map; an alternative
//! can be supplied as JSON ([`MapConfig::from_json`]).

use galileo::Color;
use galileo_types::geo::impls::GeoPoint2d;
use galileo_types::latlon;
use serde::{Deserialize, Serialize};

use crate::error::PlanMapError;

/// Identifier of the emphasized North Park overlay.
pub const NORTH_PARK_ID: &str = "north-park";
/// Identifier of the surrounding community plan areas overlay.
pub const PLAN_AREAS_ID: &str = "plan-areas";

/// Complete description of the map: viewport, basemaps and overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Window title.
    pub title: String,
    /// Initial center of the viewport.
    pub center: GeoPoint2d,
    /// Initial zoom (web mercator z-level).
    pub zoom: u32,
    /// Credit line shown for the map as a whole.
    pub attribution: CreditLine,
    /// Location of the label-override table: an `http(s)` URL or a local
    /// file path. `None` disables overrides entirely.
    pub label_overrides: Option<String>,
    /// Available basemaps in display order. The first one starts active.
    pub basemaps: Vec<Basemap>,
    /// Reference tile overlay shown on top of the imagery basemap.
    pub reference_overlay: Basemap,
    /// Thematic overlays in draw order (later entries draw on top).
    pub overlays: Vec<OverlayEntry>,
}

impl MapConfig {
    /// Parses a configuration from its JSON representation.
    pub fn from_json(text: &str) -> Result<Self, PlanMapError> {
        serde_json::from_str(text).map_err(|err| PlanMapError::Config(err.to_string()))
    }

    /// The built-in configuration: North Park emphasized over the San Diego
    /// community plan areas, with light and imagery basemaps.
    pub fn north_park() -> Self {
        let plan_areas_url = "https://services1.arcgis.com/HG80xaIVT1z1OdO5/arcgis/rest/services/Community_Plan_Areas/FeatureServer/0/query";

        Self {
            title: "North Park community plan area".to_string(),
            center: latlon!(32.7454, -117.1294),
            zoom: 13,
            attribution: CreditLine {
                text: "City of San Diego | SanGIS".to_string(),
                url: Some("https://www.sangis.org/".to_string()),
            },
            label_overrides: Some("northpark-app/data/plan_area_labels.csv".to_string()),
            basemaps: vec![
                Basemap {
                    id: "positron".to_string(),
                    title: "Streets (light)".to_string(),
                    url_template: "https://basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png"
                        .to_string(),
                    attribution: CreditLine {
                        text: "© CARTO © OpenStreetMap contributors".to_string(),
                        url: Some("https://carto.com/attributions".to_string()),
                    },
                    max_zoom: 19,
                    kind: BasemapKind::Light,
                },
                Basemap {
                    id: "voyager".to_string(),
                    title: "Streets (muted colors)".to_string(),
                    url_template: "https://basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png"
                        .to_string(),
                    attribution: CreditLine {
                        text: "© CARTO © OpenStreetMap contributors".to_string(),
                        url: Some("https://carto.com/attributions".to_string()),
                    },
                    max_zoom: 19,
                    kind: BasemapKind::Light,
                },
                Basemap {
                    id: "imagery".to_string(),
                    title: "Imagery".to_string(),
                    url_template:
                        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
                            .to_string(),
                    attribution: CreditLine {
                        text: "Esri, Maxar, Earthstar Geographics".to_string(),
                        url: None,
                    },
                    max_zoom: 19,
                    kind: BasemapKind::Imagery,
                },
            ],
            reference_overlay: Basemap {
                id: "imagery-reference".to_string(),
                title: "Place labels".to_string(),
                url_template:
                    "https://server.arcgisonline.com/ArcGIS/rest/services/Reference/World_Boundaries_and_Places/MapServer/tile/{z}/{y}/{x}"
                        .to_string(),
                attribution: CreditLine {
                    text: "Esri".to_string(),
                    url: None,
                },
                max_zoom: 19,
                kind: BasemapKind::Imagery,
            },
            overlays: vec![
                OverlayEntry {
                    id: PLAN_AREAS_ID.to_string(),
                    title: "Community plan areas".to_string(),
                    query: FeatureQuery {
                        url: plan_areas_url.to_string(),
                        where_clause: "1=1".to_string(),
                        out_fields: vec!["cpname".to_string()],
                    },
                    style: ShapeStyle {
                        fill: Color::TRANSPARENT,
                        stroke: StrokeStyle {
                            color: Color::rgba(90, 90, 90, 200),
                            width: 2.0,
                        },
                    },
                    casing: Some(StrokeStyle {
                        color: Color::rgba(255, 255, 255, 180),
                        width: 4.0,
                    }),
                    label: Some(LabelRule {
                        property: Some("cpname".to_string()),
                        text: None,
                        min_zoom: Some(12),
                        suppress: vec!["NORTH PARK".to_string()],
                    }),
                    attribution: None,
                    fit_bounds: false,
                },
                OverlayEntry {
                    id: NORTH_PARK_ID.to_string(),
                    title: "North Park".to_string(),
                    query: FeatureQuery {
                        url: plan_areas_url.to_string(),
                        where_clause: "cpname = 'NORTH PARK'".to_string(),
                        out_fields: vec!["cpname".to_string()],
                    },
                    style: ShapeStyle {
                        fill: Color::rgba(242, 140, 40, 28),
                        stroke: StrokeStyle {
                            color: Color::rgba(217, 95, 14, 255),
                            width: 3.5,
                        },
                    },
                    casing: Some(StrokeStyle {
                        color: Color::rgba(255, 255, 255, 220),
                        width: 6.0,
                    }),
                    label: Some(LabelRule {
                        property: Some("cpname".to_string()),
                        text: None,
                        min_zoom: None,
                        suppress: vec![],
                    }),
                    attribution: None,
                    fit_bounds: true,
                },
            ],
        }
    }
}

/// A text credit with an optional link, shown in the attribution corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    /// The credit text itself.
    pub text: String,
    /// Where the credit points, if anywhere.
    pub url: Option<String>,
}

/// One raster tile source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basemap {
    /// Stable identifier.
    pub id: String,
    /// Name shown in the layer control.
    pub title: String,
    /// Tile URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// Credit for the tile source.
    pub attribution: CreditLine,
    /// Deepest tile level the source serves.
    pub max_zoom: u32,
    /// Visual class of the basemap, driving overlay contrast selection.
    pub kind: BasemapKind,
}

/// Rough visual class of a basemap.
///
/// Overlay stroke and casing presets are chosen by the class of the active
/// basemap, not by its identity, so adding another light basemap requires no
/// styling changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasemapKind {
    /// Light cartographic background.
    Light,
    /// Aerial/satellite imagery.
    Imagery,
}

/// One thematic overlay: where its features come from and how they look.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayEntry {
    /// Stable identifier. The two known identifiers ([`NORTH_PARK_ID`],
    /// [`PLAN_AREAS_ID`]) get contrast-profile treatment; any other
    /// identifier keeps its configured style on every basemap.
    pub id: String,
    /// Name shown in the layer control, and the label text of last resort.
    pub title: String,
    /// The remote feature query populating this overlay.
    pub query: FeatureQuery,
    /// Fill and main stroke.
    pub style: ShapeStyle,
    /// Optional high-contrast underlay stroke drawn behind the main stroke.
    pub casing: Option<StrokeStyle>,
    /// Optional labeling rule. `None` means the overlay is never labeled.
    pub label: Option<LabelRule>,
    /// Credit for the feature source, if distinct from the map credit.
    pub attribution: Option<CreditLine>,
    /// Fit the viewport to the loaded features on first load.
    pub fit_bounds: bool,
}

/// A filtered attribute/geometry query against a feature service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureQuery {
    /// Query endpoint of the service layer.
    pub url: String,
    /// Attribute filter predicate.
    pub where_clause: String,
    /// Attribute fields to request and keep on each feature.
    pub out_fields: Vec<String>,
}

/// Fill and stroke of an overlay shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Interior color. Fully transparent means no fill is drawn.
    pub fill: Color,
    /// Main outline stroke.
    pub stroke: StrokeStyle,
}

/// A single stroke: color (with opacity) and width in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Stroke color; opacity lives in the alpha channel.
    pub color: Color,
    /// Stroke width in pixels.
    pub width: f64,
}

/// How an overlay's features are labeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Feature property whose value is the label text.
    pub property: Option<String>,
    /// Fixed text used when no property value resolves.
    pub text: Option<String>,
    /// Minimum z-level at which labels are shown. `None` shows them at
    /// every zoom.
    pub min_zoom: Option<u32>,
    /// Property values that never get a label.
    pub suppress: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_names_known_overlays() {
        let config = MapConfig::north_park();
        let ids: Vec<&str> = config.overlays.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![PLAN_AREAS_ID, NORTH_PARK_ID]);
        assert!(config.overlays.iter().any(|o| o.fit_bounds));
    }

    #[test]
    fn default_config_has_one_imagery_basemap() {
        let config = MapConfig::north_park();
        let imagery: Vec<_> = config
            .basemaps
            .iter()
            .filter(|b| b.kind == BasemapKind::Imagery)
            .collect();
        assert_eq!(imagery.len(), 1);
        assert_eq!(config.basemaps[0].kind, BasemapKind::Light);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = MapConfig::north_park();
        let json = serde_json::to_string(&config).expect("config must serialize");
        let parsed = MapConfig::from_json(&json).expect("serialized config must parse");
        assert_eq!(parsed.title, config.title);
        assert_eq!(parsed.zoom, config.zoom);
        assert_eq!(parsed.overlays.len(), config.overlays.len());
        assert_eq!(parsed.overlays[1].style, config.overlays[1].style);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = MapConfig::from_json("{not json").expect_err("must fail");
        assert!(matches!(err, PlanMapError::Config(_)));
    }
}

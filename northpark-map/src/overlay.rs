//! Overlay controllers owning the thematic feature layers.
//!
//! Each [`OverlayEntry`](crate::config::OverlayEntry) gets one
//! [`OverlayController`], which owns a galileo feature layer shared with
//! the map. All presentation state — contrast profile, zoom-gated label
//! visibility, the override table — is baked into a [`PlanAreaSymbol`];
//! every state change swaps the layer's symbol, and galileo re-renders the
//! features with it.

use std::sync::Arc;

use galileo::layer::feature_layer::{Feature, FeatureLayer};
use galileo::layer::FeatureId;
use galileo::render::render_bundle::RenderBundle;
use galileo::render::text::{
    FontStyle, FontWeight, HorizontalAlignment, TextStyle, VerticalAlignment,
};
use galileo::render::{LineCap, LinePaint, PolygonPaint};
use galileo::symbol::Symbol;
use galileo::Color;
use galileo_types::cartesian::{CartesianPoint3d, Point2, Point3, Rect, Vector2};
use galileo_types::geo::impls::GeoPoint2d;
use galileo_types::geo::Crs;
use galileo_types::geometry::Geom;
use galileo_types::geometry_type::GeoSpace2d;
use galileo_types::impls::MultiPolygon as MultiPolygonGeom;
use galileo_types::{CartesianGeometry2d, Geometry, MultiPolygon, Polygon};
use log::warn;
use parking_lot::RwLock;

use crate::config::{LabelRule, OverlayEntry, StrokeStyle, PLAN_AREAS_ID};
use crate::contrast::{self, ContrastProfile};
use crate::features::PlanAreaFeature;
use crate::labels::{self, LabelOverrides};

/// The feature layer type all overlays use.
pub type PlanAreaLayer = FeatureLayer<GeoPoint2d, PlanAreaFeature, PlanAreaSymbol, GeoSpace2d>;

// Resolution of web mercator z-level 0 with 256 px tiles.
const TOP_RESOLUTION: f64 = 156543.03392800014;

/// Web mercator z-level displayed at the given view resolution.
pub fn z_level_for_resolution(resolution: f64) -> u32 {
    if resolution <= 0.0 {
        return 0;
    }
    let level = (TOP_RESOLUTION / resolution).log2() + 1e-9;
    level.floor().max(0.0) as u32
}

/// View resolution of a web mercator z-level.
pub fn resolution_for_z_level(z_level: u32) -> f64 {
    TOP_RESOLUTION / 2f64.powi(z_level as i32)
}

/// Renders one plan area: casing underlay first, then fill and main
/// stroke, then a label at the feature's visual center.
#[derive(Debug, Clone)]
pub struct PlanAreaSymbol {
    /// Interior color. Fully transparent means no fill is drawn.
    pub fill: Color,
    /// Main outline stroke.
    pub stroke: StrokeStyle,
    /// Wider underlay stroke drawn behind the main stroke.
    pub casing: Option<StrokeStyle>,
    /// Label state, when the overlay is labeled at all.
    pub label: Option<LabelPaint>,
}

/// Label inputs baked into a symbol for the current zoom and override
/// table.
#[derive(Debug, Clone)]
pub struct LabelPaint {
    /// The overlay's labeling rule.
    pub rule: LabelRule,
    /// Override table shared across overlays, once loaded.
    pub overrides: Option<Arc<LabelOverrides>>,
    /// Whether this overlay consults the override table.
    pub use_overrides: bool,
    /// Overlay title, the text of last resort.
    pub title: String,
    /// Zoom gate: false hides every label of the overlay.
    pub enabled: bool,
    /// Text appearance.
    pub style: TextStyle,
}

impl Symbol<PlanAreaFeature> for PlanAreaSymbol {
    fn render(
        &self,
        feature: &PlanAreaFeature,
        geometry: &Geom<Point3>,
        min_resolution: f64,
        bundle: &mut RenderBundle,
    ) {
        let Geom::MultiPolygon(polygons) = geometry else {
            return;
        };

        // Casing goes into the bundle before everything else so the main
        // stroke always draws over it.
        if let Some(casing) = &self.casing {
            let paint = LinePaint {
                color: casing.color,
                width: casing.width,
                offset: 0.0,
                line_cap: LineCap::Round,
            };
            for polygon in polygons.polygons() {
                for contour in polygon.iter_contours() {
                    bundle.add_line(contour, &paint, min_resolution);
                }
            }
        }

        let stroke_paint = LinePaint {
            color: self.stroke.color,
            width: self.stroke.width,
            offset: 0.0,
            line_cap: LineCap::Butt,
        };
        for polygon in polygons.polygons() {
            if !self.fill.is_transparent() {
                bundle.add_polygon(polygon, &PolygonPaint { color: self.fill }, min_resolution);
            }
            for contour in polygon.iter_contours() {
                bundle.add_line(contour, &stroke_paint, min_resolution);
            }
        }

        if let Some(label) = &self.label {
            render_label(label, feature, polygons, bundle);
        }
    }
}

fn render_label(
    label: &LabelPaint,
    feature: &PlanAreaFeature,
    geometry: &MultiPolygonGeom<Point3>,
    bundle: &mut RenderBundle,
) {
    if !label.enabled {
        return;
    }
    let value = label
        .rule
        .property
        .as_deref()
        .and_then(|property| feature.attribute(property));
    if labels::suppressed(&label.rule, value) {
        return;
    }
    let Some(anchor) = visual_center(geometry) else {
        return;
    };
    let text = labels::resolve_text(
        &label.rule,
        label.use_overrides,
        label.overrides.as_deref(),
        &label.title,
        feature,
    );
    if text.is_empty() {
        return;
    }
    bundle.add_label(&anchor, &text, &label.style, Vector2::new(0.0, 0.0), false);
}

/// Center of the merged bounding rectangle of the outer contours — where
/// the label is anchored.
fn visual_center(geometry: &MultiPolygonGeom<Point3>) -> Option<Point3> {
    let mut x_min = f64::INFINITY;
    let mut y_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for polygon in geometry.polygons() {
        for point in &polygon.outer_contour().points {
            x_min = x_min.min(point.x());
            y_min = y_min.min(point.y());
            x_max = x_max.max(point.x());
            y_max = y_max.max(point.y());
        }
    }

    (x_min <= x_max).then(|| Point3::new((x_min + x_max) / 2.0, (y_min + y_max) / 2.0, 0.0))
}

/// Owns one thematic overlay: its feature layer, the features in it, and
/// the presentation state driving the layer's symbol.
pub struct OverlayController {
    entry: OverlayEntry,
    layer: Arc<RwLock<PlanAreaLayer>>,
    feature_ids: Vec<FeatureId>,
    profile: ContrastProfile,
    labels_enabled: bool,
    overrides: Option<Arc<LabelOverrides>>,
    loaded: bool,
}

impl OverlayController {
    /// Creates a controller with an empty layer for the given entry.
    pub fn new(entry: OverlayEntry) -> Self {
        let profile = ContrastProfile::default();
        let labels_enabled = entry
            .label
            .as_ref()
            .and_then(|rule| rule.min_zoom)
            .is_none();
        let symbol = symbol_for(&entry, profile, labels_enabled, None);
        Self {
            layer: Arc::new(RwLock::new(FeatureLayer::new(
                Vec::new(),
                symbol,
                Crs::WGS84,
            ))),
            entry,
            feature_ids: Vec::new(),
            profile,
            labels_enabled,
            overrides: None,
            loaded: false,
        }
    }

    /// The entry this controller was built from.
    pub fn entry(&self) -> &OverlayEntry {
        &self.entry
    }

    /// Overlay identifier.
    pub fn id(&self) -> &str {
        &self.entry.id
    }

    /// The feature layer, to be pushed into the map's layer collection.
    pub fn layer(&self) -> Arc<RwLock<PlanAreaLayer>> {
        self.layer.clone()
    }

    /// Number of features currently in the overlay.
    pub fn feature_count(&self) -> usize {
        self.feature_ids.len()
    }

    /// Replaces the overlay's features.
    ///
    /// Returns the merged projected bounds of the new features on the
    /// first load of an overlay that asked for a viewport fit; `None`
    /// otherwise.
    pub fn set_features(&mut self, features: Vec<PlanAreaFeature>) -> Option<Rect> {
        let fit = (self.entry.fit_bounds && !self.loaded)
            .then(|| projected_bounds(&features))
            .flatten();
        self.loaded = true;

        let mut layer = self.layer.write();
        for id in self.feature_ids.drain(..) {
            layer.features_mut().remove(id);
            layer.update_feature(id);
        }
        let mut ids = Vec::with_capacity(features.len());
        for feature in features {
            let id = layer.features_mut().add(feature);
            layer.update_feature(id);
            ids.push(id);
        }
        drop(layer);
        self.feature_ids = ids;

        fit
    }

    /// Recomputes label visibility for the given zoom and override table
    /// and pushes the result to the layer.
    pub fn refresh_labels(&mut self, z_level: u32, overrides: Option<&Arc<LabelOverrides>>) {
        self.labels_enabled = self
            .entry
            .label
            .as_ref()
            .and_then(|rule| rule.min_zoom)
            .is_none_or(|min| z_level >= min);
        self.overrides = overrides.cloned();
        self.apply_symbol();
    }

    /// Swaps stroke and casing paints for the given profile.
    ///
    /// Overlays without a preset for their identifier keep their
    /// configured style; applying a profile to them changes nothing.
    pub fn apply_contrast_profile(&mut self, profile: ContrastProfile) {
        self.profile = profile;
        self.apply_symbol();
    }

    /// The symbol the overlay currently renders with.
    pub fn current_symbol(&self) -> PlanAreaSymbol {
        symbol_for(
            &self.entry,
            self.profile,
            self.labels_enabled,
            self.overrides.clone(),
        )
    }

    /// Text the overlay currently displays for `feature`, or `None` when
    /// its label is hidden.
    pub fn resolved_label(&self, feature: &PlanAreaFeature) -> Option<String> {
        let rule = self.entry.label.as_ref()?;
        if !self.labels_enabled {
            return None;
        }
        let value = rule
            .property
            .as_deref()
            .and_then(|property| feature.attribute(property));
        if labels::suppressed(rule, value) {
            return None;
        }
        Some(labels::resolve_text(
            rule,
            self.entry.id == PLAN_AREAS_ID,
            self.overrides.as_deref(),
            &self.entry.title,
            feature,
        ))
    }

    fn apply_symbol(&self) {
        self.layer.write().set_symbol(self.current_symbol());
    }
}

fn symbol_for(
    entry: &OverlayEntry,
    profile: ContrastProfile,
    labels_enabled: bool,
    overrides: Option<Arc<LabelOverrides>>,
) -> PlanAreaSymbol {
    let (stroke, casing) = match contrast::preset(&entry.id, profile) {
        Some(preset) => (preset.stroke, preset.casing),
        None => (entry.style.stroke, entry.casing),
    };

    PlanAreaSymbol {
        fill: entry.style.fill,
        stroke,
        casing,
        label: entry.label.as_ref().map(|rule| LabelPaint {
            rule: rule.clone(),
            overrides,
            use_overrides: entry.id == PLAN_AREAS_ID,
            title: entry.title.clone(),
            enabled: labels_enabled,
            style: label_style(profile),
        }),
    }
}

fn label_style(profile: ContrastProfile) -> TextStyle {
    let (font_color, outline_color) = match profile {
        ContrastProfile::Light => (Color::rgba(51, 51, 51, 255), Color::rgba(255, 255, 255, 220)),
        ContrastProfile::Imagery => (Color::WHITE, Color::rgba(0, 0, 0, 200)),
    };
    TextStyle {
        font_family: vec![
            "Noto Sans".to_string(),
            "DejaVu Sans".to_string(),
            "Arial".to_string(),
        ],
        font_size: 13.0,
        font_color,
        horizontal_alignment: HorizontalAlignment::Center,
        vertical_alignment: VerticalAlignment::Middle,
        weight: FontWeight::BOLD,
        style: FontStyle::Normal,
        outline_width: 2.0,
        outline_color,
    }
}

/// Merged bounds of the features in map (EPSG:3857) coordinates.
///
/// Features that cannot be projected are skipped; if none are left the
/// viewport is not moved.
fn projected_bounds(features: &[PlanAreaFeature]) -> Option<Rect> {
    let projection = Crs::EPSG3857.get_projection::<GeoPoint2d, Point2>()?;
    let mut merged: Option<Rect> = None;
    for feature in features {
        let Some(geometry) = feature.geometry().project(&*projection) else {
            warn!("overlay feature cannot be projected to the map CRS");
            continue;
        };
        let Some(rect) = geometry.bounding_rectangle() else {
            continue;
        };
        merged = Some(match merged {
            Some(current) => current.merge(rect),
            None => rect,
        });
    }
    merged
}

/// Explicit collection of the overlay controllers, in draw order.
///
/// Built once at startup and handed by reference to whatever needs to act
/// on all overlays; nothing else holds the controllers.
#[derive(Default)]
pub struct OverlayRegistry {
    controllers: Vec<OverlayController>,
}

impl OverlayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a controller. Registration order is draw order.
    pub fn register(&mut self, controller: OverlayController) {
        self.controllers.push(controller);
    }

    /// Controller for the given overlay identifier.
    pub fn get(&self, id: &str) -> Option<&OverlayController> {
        self.controllers.iter().find(|controller| controller.id() == id)
    }

    /// Mutable controller for the given overlay identifier.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut OverlayController> {
        self.controllers
            .iter_mut()
            .find(|controller| controller.id() == id)
    }

    /// Iterates over the controllers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayController> {
        self.controllers.iter()
    }

    /// Iterates mutably over the controllers in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OverlayController> {
        self.controllers.iter_mut()
    }

    /// Number of registered controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True when no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Applies a contrast profile to every overlay.
    pub fn apply_contrast_profile(&mut self, profile: ContrastProfile) {
        for controller in &mut self.controllers {
            controller.apply_contrast_profile(profile);
        }
    }

    /// Refreshes every overlay's labels for the given zoom and override
    /// table.
    pub fn refresh_labels(&mut self, z_level: u32, overrides: Option<&Arc<LabelOverrides>>) {
        for controller in &mut self.controllers {
            controller.refresh_labels(z_level, overrides);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::{FeatureQuery, ShapeStyle};
    use crate::features::parse_features;

    const NORTH_PARK_RESPONSE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"cpname": "NORTH PARK"},
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

    fn entry(id: &str, fit_bounds: bool) -> OverlayEntry {
        OverlayEntry {
            id: id.to_string(),
            title: "North Park".to_string(),
            query: FeatureQuery {
                url: "https://features.test/query".to_string(),
                where_clause: "cpname = 'NORTH PARK'".to_string(),
                out_fields: vec!["cpname".to_string()],
            },
            style: ShapeStyle {
                fill: Color::rgba(242, 140, 40, 28),
                stroke: StrokeStyle {
                    color: Color::rgba(10, 20, 30, 255),
                    width: 1.5,
                },
            },
            casing: None,
            label: Some(LabelRule {
                property: Some("cpname".to_string()),
                text: None,
                min_zoom: None,
                suppress: vec![],
            }),
            attribution: None,
            fit_bounds,
        }
    }

    fn north_park_features() -> Vec<PlanAreaFeature> {
        parse_features(NORTH_PARK_RESPONSE, &["cpname".to_string()])
            .expect("fixture must parse")
    }

    #[test]
    fn end_to_end_single_polygon_load() {
        let mut controller = OverlayController::new(entry(crate::config::NORTH_PARK_ID, true));
        let features = north_park_features();

        let fit = controller.set_features(features.clone());
        let rect = fit.expect("first load of a fit-bounds overlay must produce bounds");
        assert!(rect.width() > 0.0 && rect.height() > 0.0);
        assert_eq!(controller.feature_count(), 1);

        controller.refresh_labels(14, None);
        assert_eq!(
            controller.resolved_label(&features[0]).as_deref(),
            Some("NORTH PARK")
        );

        // the viewport is fit exactly once per overlay
        assert!(controller.set_features(features).is_none());
        assert_eq!(controller.feature_count(), 1);
    }

    #[test]
    fn overlay_without_fit_bounds_never_produces_bounds() {
        let mut controller = OverlayController::new(entry("plan-areas", false));
        assert!(controller.set_features(north_park_features()).is_none());
    }

    #[test]
    fn labels_follow_the_zoom_gate() {
        let mut with_min_zoom = entry(crate::config::PLAN_AREAS_ID, false);
        with_min_zoom.label = Some(LabelRule {
            property: Some("cpname".to_string()),
            text: None,
            min_zoom: Some(12),
            suppress: vec![],
        });
        let mut controller = OverlayController::new(with_min_zoom);
        let features = north_park_features();
        controller.set_features(features.clone());

        controller.refresh_labels(11, None);
        assert_eq!(controller.resolved_label(&features[0]), None);

        controller.refresh_labels(12, None);
        assert_eq!(
            controller.resolved_label(&features[0]).as_deref(),
            Some("NORTH PARK")
        );
    }

    #[test]
    fn contrast_profile_round_trips() {
        let mut controller = OverlayController::new(entry(crate::config::NORTH_PARK_ID, false));
        let original = controller.current_symbol();

        controller.apply_contrast_profile(ContrastProfile::Imagery);
        assert_ne!(controller.current_symbol().stroke, original.stroke);

        controller.apply_contrast_profile(ContrastProfile::Light);
        let restored = controller.current_symbol();
        assert_eq!(restored.stroke, original.stroke);
        assert_eq!(restored.casing, original.casing);
        assert_eq!(restored.fill, original.fill);
    }

    #[test]
    fn unknown_overlay_keeps_configured_style() {
        let unknown = entry("bike-routes", false);
        let configured = unknown.style.stroke;
        let mut controller = OverlayController::new(unknown);

        controller.apply_contrast_profile(ContrastProfile::Imagery);
        assert_eq!(controller.current_symbol().stroke, configured);
    }

    #[test]
    fn visual_center_is_bounds_center() {
        let polygon: galileo_types::impls::Polygon<Point3> = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 2.0, 0.0),
        ]
        .into();
        let center =
            visual_center(&MultiPolygonGeom::from(vec![polygon])).expect("non-empty geometry");
        assert_relative_eq!(center.x(), 2.0);
        assert_relative_eq!(center.y(), 1.0);
    }

    #[test]
    fn empty_geometry_has_no_visual_center() {
        assert!(visual_center(&MultiPolygonGeom::from(Vec::new())).is_none());
    }

    #[test]
    fn z_levels_match_resolutions() {
        assert_relative_eq!(resolution_for_z_level(0), TOP_RESOLUTION);
        assert_eq!(z_level_for_resolution(resolution_for_z_level(12)), 12);
        assert_eq!(z_level_for_resolution(resolution_for_z_level(12) * 0.99), 12);
        assert_eq!(z_level_for_resolution(resolution_for_z_level(12) * 1.5), 11);
        assert_eq!(z_level_for_resolution(0.0), 0);
    }
}

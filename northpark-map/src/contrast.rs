//! Basemap-dependent contrast handling.
//!
//! Overlay strokes tuned for a light cartographic background disappear
//! against aerial imagery. Whenever the active basemap changes, the
//! coordinator derives a two-valued [`ContrastProfile`] from the basemap's
//! visual class and pushes it to every registered overlay, which swaps its
//! stroke and casing paints between two fixed presets.

use galileo::Color;

use crate::config::{Basemap, BasemapKind, StrokeStyle, NORTH_PARK_ID, PLAN_AREAS_ID};
use crate::overlay::OverlayRegistry;

/// Display mode derived from the active basemap.
///
/// There is no hysteresis: the profile is a pure function of which basemap
/// is active, recomputed on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContrastProfile {
    /// Overlays styled for light cartographic basemaps.
    #[default]
    Light,
    /// Overlays styled for aerial imagery.
    Imagery,
}

impl ContrastProfile {
    /// The profile implied by a basemap.
    pub fn for_basemap(basemap: &Basemap) -> Self {
        match basemap.kind {
            BasemapKind::Light => ContrastProfile::Light,
            BasemapKind::Imagery => ContrastProfile::Imagery,
        }
    }
}

/// Stroke and casing paints an overlay uses under one contrast profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePreset {
    /// Main stroke.
    pub stroke: StrokeStyle,
    /// Casing underlay stroke, if the overlay is cased.
    pub casing: Option<StrokeStyle>,
}

/// The fixed presets for the two known overlays.
///
/// Unknown overlay identifiers have no presets and keep their configured
/// style under every profile.
pub fn preset(overlay_id: &str, profile: ContrastProfile) -> Option<StrokePreset> {
    match (overlay_id, profile) {
        (PLAN_AREAS_ID, ContrastProfile::Light) => Some(StrokePreset {
            stroke: StrokeStyle {
                color: Color::rgba(90, 90, 90, 200),
                width: 2.0,
            },
            casing: Some(StrokeStyle {
                color: Color::rgba(255, 255, 255, 180),
                width: 4.0,
            }),
        }),
        (PLAN_AREAS_ID, ContrastProfile::Imagery) => Some(StrokePreset {
            stroke: StrokeStyle {
                color: Color::rgba(240, 240, 240, 230),
                width: 2.0,
            },
            casing: Some(StrokeStyle {
                color: Color::rgba(20, 20, 20, 160),
                width: 4.5,
            }),
        }),
        (NORTH_PARK_ID, ContrastProfile::Light) => Some(StrokePreset {
            stroke: StrokeStyle {
                color: Color::rgba(217, 95, 14, 255),
                width: 3.5,
            },
            casing: Some(StrokeStyle {
                color: Color::rgba(255, 255, 255, 220),
                width: 6.0,
            }),
        }),
        (NORTH_PARK_ID, ContrastProfile::Imagery) => Some(StrokePreset {
            stroke: StrokeStyle {
                color: Color::rgba(255, 201, 60, 255),
                width: 3.5,
            },
            casing: Some(StrokeStyle {
                color: Color::rgba(0, 0, 0, 200),
                width: 6.5,
            }),
        }),
        _ => None,
    }
}

/// Applies contrast changes to the overlay registry when the active basemap
/// changes.
///
/// The registry is passed into every call rather than captured at
/// construction, so the coordinator itself holds nothing but the current
/// profile.
#[derive(Debug, Default)]
pub struct ContrastCoordinator {
    profile: ContrastProfile,
}

impl ContrastCoordinator {
    /// Creates a coordinator starting in the light profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// The profile applied most recently.
    pub fn profile(&self) -> ContrastProfile {
        self.profile
    }

    /// Recomputes the profile for the newly active basemap and restyles
    /// every registered overlay.
    ///
    /// Returns whether the imagery reference overlay should now be shown.
    /// Applying the same basemap repeatedly is harmless: the profile
    /// function is pure and overlay restyling is idempotent.
    pub fn basemap_changed(&mut self, active: &Basemap, registry: &mut OverlayRegistry) -> bool {
        self.profile = ContrastProfile::for_basemap(active);
        registry.apply_contrast_profile(self.profile);
        active.kind == BasemapKind::Imagery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::overlay::OverlayController;

    fn registry() -> OverlayRegistry {
        let mut registry = OverlayRegistry::new();
        for entry in MapConfig::north_park().overlays {
            registry.register(OverlayController::new(entry));
        }
        registry
    }

    fn basemap(kind: BasemapKind) -> Basemap {
        Basemap {
            id: "test".to_string(),
            title: "Test".to_string(),
            url_template: "https://tiles.test/{z}/{x}/{y}.png".to_string(),
            attribution: crate::config::CreditLine {
                text: "test".to_string(),
                url: None,
            },
            max_zoom: 19,
            kind,
        }
    }

    #[test]
    fn profile_follows_basemap_kind() {
        assert_eq!(
            ContrastProfile::for_basemap(&basemap(BasemapKind::Light)),
            ContrastProfile::Light
        );
        assert_eq!(
            ContrastProfile::for_basemap(&basemap(BasemapKind::Imagery)),
            ContrastProfile::Imagery
        );
    }

    #[test]
    fn known_overlays_have_presets_for_both_profiles() {
        for id in [PLAN_AREAS_ID, NORTH_PARK_ID] {
            let light = preset(id, ContrastProfile::Light).expect("light preset");
            let imagery = preset(id, ContrastProfile::Imagery).expect("imagery preset");
            assert_ne!(light, imagery);
        }
        assert!(preset("bike-routes", ContrastProfile::Light).is_none());
    }

    #[test]
    fn reference_overlay_follows_imagery_basemap() {
        let mut registry = registry();
        let mut coordinator = ContrastCoordinator::new();

        assert!(coordinator.basemap_changed(&basemap(BasemapKind::Imagery), &mut registry));
        assert_eq!(coordinator.profile(), ContrastProfile::Imagery);

        assert!(!coordinator.basemap_changed(&basemap(BasemapKind::Light), &mut registry));
        assert_eq!(coordinator.profile(), ContrastProfile::Light);
    }

    #[test]
    fn double_toggle_restores_initial_state() {
        let mut registry = registry();
        let mut coordinator = ContrastCoordinator::new();

        let initial: Vec<_> = registry
            .iter()
            .map(|controller| controller.current_symbol())
            .collect();

        coordinator.basemap_changed(&basemap(BasemapKind::Imagery), &mut registry);
        let reference_shown =
            coordinator.basemap_changed(&basemap(BasemapKind::Light), &mut registry);

        assert!(!reference_shown);
        for (controller, symbol) in registry.iter().zip(&initial) {
            assert_eq!(controller.current_symbol().stroke, symbol.stroke);
            assert_eq!(controller.current_symbol().casing, symbol.casing);
        }
    }
}

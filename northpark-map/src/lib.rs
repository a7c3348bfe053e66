//! Composition layer for an interactive map of San Diego's North Park
//! community plan area.
//!
//! The crate does not render anything itself. It describes *what* the map
//! contains and how the pieces react to each other, and hands fully
//! configured [galileo](galileo) layers to the embedding application:
//!
//! * [`config`] declares the map contents: basemaps, the imagery reference
//!   overlay, and the thematic overlay entries (remote query, styling,
//!   casing, label rule).
//! * [`features`] queries an ArcGIS-style feature service and converts the
//!   returned GeoJSON into galileo feature-layer features.
//! * [`overlay`] owns one feature layer per overlay entry and keeps its
//!   symbol in sync with the current zoom, label-override table and
//!   contrast profile.
//! * [`labels`] loads the curated label-override table and resolves label
//!   text with a fixed precedence chain.
//! * [`contrast`] derives the two-valued contrast profile from the active
//!   basemap and pushes it to every registered overlay.
//! * [`basemap`] builds raster tile layers from URL templates.
//!
//! Everything here is synchronous or plainly `async`; the crate spawns no
//! tasks and owns no runtime. Failures in remote data degrade the map
//! (missing overlay, fallback labels) instead of propagating to the caller.

pub mod basemap;
pub mod config;
pub mod contrast;
pub mod error;
pub mod features;
pub mod labels;
pub mod overlay;

pub use error::PlanMapError;

//! Error types used by the crate.

use thiserror::Error;

/// Errors produced while assembling the map.
///
/// Remote data failures are deliberately coarse: the application logs them
/// and renders without the affected piece, so the variants only need to
/// separate "configuration is unusable" (fatal to startup) from the
/// recoverable load and decode failures.
#[derive(Debug, Error)]
pub enum PlanMapError {
    /// The configuration could not be read or parsed. Fatal to
    /// initialization: nothing is rendered without a valid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Network or file I/O failure.
    #[error("failed to load data")]
    Io,
    /// A remote service returned data that could not be decoded.
    #[error("failed to decode data: {0}")]
    Decoding(String),
    /// A map layer could not be constructed.
    #[error(transparent)]
    Layer(#[from] galileo::error::GalileoError),
    /// The application window could not be created.
    #[error("failed to initialize the application window: {0}")]
    Init(String),
}

impl From<reqwest::Error> for PlanMapError {
    fn from(_value: reqwest::Error) -> Self {
        Self::Io
    }
}

impl From<std::io::Error> for PlanMapError {
    fn from(_value: std::io::Error) -> Self {
        Self::Io
    }
}

impl From<geojson::Error> for PlanMapError {
    fn from(value: geojson::Error) -> Self {
        Self::Decoding(value.to_string())
    }
}

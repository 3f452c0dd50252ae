//! Telemetry error types

use thiserror::Error;

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while submitting telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Telemetry endpoint returned status {status}")]
    Status { status: u16 },

    /// Submitter configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

//! Client error types.

use prefab_core::PrefabError;
use prefab_telemetry::TelemetryError;
use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by the client and its background tasks.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Resolution error from the core.
    #[error(transparent)]
    Prefab(#[from] PrefabError),

    /// Options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config service answered with a non-success status.
    #[error("Config service returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The event stream could not be decoded.
    #[error("Event stream error: {0}")]
    Stream(String),

    /// A streamed event carried invalid base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The background runtime could not be created.
    #[error("Failed to start background runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// Telemetry submitter could not be set up.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Request failed after all retries exhausted.
    #[error("Request failed after {attempts} attempts: {message}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        message: String,
    },
}

impl ClientError {
    /// Whether another attempt at the same request may succeed.
    ///
    /// Every non-2xx answer and every transport failure qualifies; decode
    /// and configuration errors do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { .. } => true,
            Self::Http(e) => !e.is_builder(),
            _ => false,
        }
    }

    /// The core error, when this wraps one.
    pub fn as_prefab(&self) -> Option<&PrefabError> {
        match self {
            Self::Prefab(e) => Some(e),
            _ => None,
        }
    }
}

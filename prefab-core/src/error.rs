//! Error types for config resolution.

use std::time::Duration;
use thiserror::Error;

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, PrefabError>;

/// Errors surfaced while loading or resolving configs.
#[derive(Debug, Error)]
pub enum PrefabError {
    /// No store holds a config with this key.
    #[error("Config does not exist: {0}")]
    ConfigDoesNotExist(String),

    /// A provided value references an unset environment variable.
    #[error("Environment variable does not exist: {0}")]
    EnvVarNotExist(String),

    /// An environment variable could not be coerced to the config's value type.
    #[error("Cannot coerce environment variable {variable} to {value_type}")]
    TypeCoercionFailed {
        /// Name of the environment variable.
        variable: String,
        /// Declared value type of the config.
        value_type: String,
    },

    /// Key lookup or AES-GCM authentication failed.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// The first snapshot did not arrive in time.
    #[error("Initialization timed out after {0:?}")]
    InitializationTimeout(Duration),

    /// A config or value violates a structural invariant.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A local config file could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Protobuf payload could not be decoded.
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrefabError {
    /// Check if this error means the key is simply unknown.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::ConfigDoesNotExist(_))
    }
}

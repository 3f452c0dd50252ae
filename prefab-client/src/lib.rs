//! # Prefab Client
//!
//! Runtime client for Prefab feature flags and dynamic configuration.
//!
//! ## Features
//!
//! - **Layered sources**: the config service, local YAML files, binary dumps
//!   and in-memory values, first hit wins
//! - **Live updates**: initial snapshot fetch with retry and backoff, then
//!   server-sent event streaming from the last seen config id
//! - **Typed getters**: `Ok(None)` on type mismatch, `_with_default` forms
//!   that never fail
//! - **Context layering**: global context, bound context, call context
//! - **Telemetry**: evaluation summaries and context reporting in the
//!   background
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prefab_client::{Client, ClientOptions, ConfigLookup};
//! use prefab_core::{Context, ContextSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientOptions::builder().api_key("my-api-key").build())?;
//!     client.start()?;
//!     client.initialized().await?;
//!
//!     let user = ContextSet::new().with_context(Context::new("user").with("key", "u-123"));
//!     if client.feature_is_on_for("new-checkout", &user) {
//!         println!("new checkout enabled");
//!     }
//!
//!     let limit = client.get_int_value_with_default("rate-limit", &user, 100);
//!     println!("limit: {limit}");
//!
//!     client.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Local Files Only
//!
//! ```rust,no_run
//! use prefab_client::{Client, ClientOptions, ConfigLookup, Source};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(
//!     ClientOptions::builder()
//!         .source(Source::LocalFiles)
//!         .config_directory("./config")
//!         .environment_name("development")
//!         .build(),
//! )?;
//!
//! let level = client.get_log_level("app.db");
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod fetcher;
mod gate;
mod options;
mod retry;
mod sse;

pub use client::{Client, ConfigLookup, ContextBoundClient};
pub use error::{ClientError, Result};
pub use fetcher::{HttpSnapshotFetcher, SnapshotFetcher};
pub use gate::InitGate;
pub use options::{
    API_KEY_ENV_VAR, API_URL_ENV_VAR, ClientOptions, ClientOptionsBuilder, DEFAULT_API_URL,
    DEFAULT_CONFIG_FILE, OnInitializationFailure, Source, environment_config_file,
};
pub use retry::{BackoffStrategy, RetryConfig};
pub use sse::{ConfigStream, START_AT_ID_HEADER, apply_event};

//! # Prefab Telemetry
//!
//! Aggregates what a Prefab client evaluates and periodically reports it to
//! the telemetry service.
//!
//! ## Features
//!
//! - **Evaluation summaries**: counts per config, branch and selected value
//! - **Context shapes**: property names and type codes per named context
//! - **Example contexts**: one full context set per distinct grouped key
//! - **Submitter**: protobuf POST on a fixed interval, failures logged and dropped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prefab_core::{MemoryConfigStore, Resolver};
//! use prefab_telemetry::{TelemetryRecorder, TelemetrySubmitter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recorder = Arc::new(TelemetryRecorder::default());
//!     let resolver = Resolver::new(Arc::new(MemoryConfigStore::new([("greeting", "hello")])))
//!         .with_listener(recorder.clone());
//!
//!     let submitter = TelemetrySubmitter::new("https://telemetry.prefab.cloud", "api-key", recorder)?
//!         .with_interval(Duration::from_secs(30));
//!     let handle = Arc::new(submitter).start();
//!
//!     resolver.resolve("greeting", &Default::default())?;
//!     handle.abort();
//!     Ok(())
//! }
//! ```

mod error;
mod example_contexts;
mod recorder;
mod shapes;
mod submitter;
mod summary;

pub use error::{Result, TelemetryError};
pub use example_contexts::ExampleContextAggregator;
pub use recorder::{ContextUploadMode, TelemetryRecorder};
pub use shapes::{ContextShapeAggregator, shape_code};
pub use submitter::{DEFAULT_SYNC_INTERVAL, DEFAULT_TELEMETRY_HOST, TelemetrySubmitter};
pub use summary::EvaluationSummaryAggregator;

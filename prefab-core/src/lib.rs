//! # Prefab Core
//!
//! Resolution engine for Prefab feature flags and dynamic configuration.
//!
//! ## Features
//!
//! - **Typed values**: a closed [`ConfigValue`] union with non-coercing accessors
//! - **Targeting**: environment rows, conditional values and criteria
//! - **Segments**: configs reused as boolean predicates by other configs
//! - **Weighted splits**: deterministic bucketing by a context property
//! - **Provided and encrypted values**: environment variables and AES-GCM secrets
//! - **Layered stores**: live API store with id-ordered merge, YAML files,
//!   binary dumps and in-memory maps behind one first-hit composite
//!
//! ## Quick Start
//!
//! ```
//! use prefab_core::{Context, ContextSet, MemoryConfigStore, Resolver};
//! use std::sync::Arc;
//!
//! let store = MemoryConfigStore::new([("greeting", "hello")]);
//! let resolver = Resolver::new(Arc::new(store));
//!
//! let context = ContextSet::new().with_context(Context::new("user").with("key", "u-1"));
//! let found = resolver.resolve("greeting", &context).unwrap();
//! assert_eq!(found.value.unwrap().as_str(), Some("hello"));
//! ```

pub mod config;
pub mod context;
mod convert;
pub mod crypto;
pub mod duration;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod resolver;
pub mod store;
pub mod value;
pub mod weighted;
pub mod wire;

pub use config::{
    ConditionalValue, Config, ConfigRow, ConfigType, Criterion, Operator, Snapshot, ValueType,
};
pub use context::{Context, ContextChain, ContextSet, ContextValueGetter};
pub use crypto::{AesGcmDecrypter, Decrypter};
pub use env::{EnvLookup, MapEnv, ProcessEnv};
pub use error::{PrefabError, Result};
pub use evaluator::{ConditionMatch, DEFAULT_MAX_SEGMENT_DEPTH, RuleEvaluator};
pub use resolver::{ConfigMatch, EvaluationListener, Resolver};
pub use store::{
    ApiConfigStore, ApplyOutcome, CompositeConfigStore, ConfigStore, DumpConfigStore,
    LocalConfigStore, MemoryConfigStore,
};
pub use value::{
    ConfigValue, IntRange, LogLevel, NativeValue, Provided, ProvidedSource, Value, WeightedValue,
    WeightedValues,
};
pub use weighted::WeightedValuePicker;

/// Crate version, reported to the config service.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

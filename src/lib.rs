// Prefab - feature flags and dynamic configuration for Rust
//
// This library bundles the resolution engine, the telemetry pipeline and the
// client runtime behind one import.

// Re-export the client surface
pub use prefab_client::*;

// Re-export the building blocks
pub use prefab_core as core;
pub use prefab_telemetry as telemetry;

pub use prefab_core::{
    ConfigMatch, ConfigType, ConfigValue, Context, ContextSet, LogLevel, PrefabError, Value,
};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Client, ClientOptions, ConfigLookup, ConfigMatch, ConfigValue, Context, ContextBoundClient,
        ContextSet, LogLevel, OnInitializationFailure, Source,
    };
    pub use prefab_telemetry::ContextUploadMode;
}

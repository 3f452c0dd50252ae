//! Config stores.
//!
//! Every store answers keyed lookups; the [`CompositeConfigStore`] fans in
//! several of them with first-hit semantics. Only the [`ApiConfigStore`]
//! changes after construction.

mod api;
mod composite;
mod dump;
mod local;
mod memory;

pub use api::{ApiConfigStore, ApplyOutcome};
pub use composite::CompositeConfigStore;
pub use dump::DumpConfigStore;
pub use local::LocalConfigStore;
pub use memory::MemoryConfigStore;

use crate::config::Config;
use crate::context::ContextValueGetter;
use crate::value::ConfigValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed config lookup.
pub trait ConfigStore: Send + Sync {
    /// Get a config by key.
    fn get_config(&self, key: &str) -> Option<Arc<Config>>;

    /// Look up a property of the store's default context.
    fn get_context_value(&self, _property_name: &str) -> Option<ConfigValue> {
        None
    }

    /// Environment the store is bound to, if any.
    fn project_env_id(&self) -> Option<i64> {
        None
    }

    /// All keys the store holds.
    fn keys(&self) -> Vec<String>;

    /// Whether the store has received its data.
    fn is_initialized(&self) -> bool {
        true
    }
}

/// Exposes a store's default context as a context getter.
pub struct StoreContext<'a>(pub &'a dyn ConfigStore);

impl ContextValueGetter for StoreContext<'_> {
    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue> {
        self.0.get_context_value(property_name)
    }
}

/// Immutable key → config map shared by the read-only stores.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigMap {
    configs: HashMap<String, Arc<Config>>,
}

impl ConfigMap {
    pub(crate) fn from_configs(configs: impl IntoIterator<Item = Config>) -> Self {
        Self {
            configs: configs
                .into_iter()
                .map(|config| (config.key.clone(), Arc::new(config)))
                .collect(),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<Config>> {
        self.configs.get(key).cloned()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.configs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.configs.len()
    }
}

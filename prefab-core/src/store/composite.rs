//! Ordered fan-in of several stores.

use super::ConfigStore;
use crate::config::Config;
use crate::value::ConfigValue;
use std::collections::HashSet;
use std::sync::Arc;

/// First-hit lookup across an ordered list of stores.
///
/// Nothing is cached, so live updates to a leaf store show through
/// immediately.
#[derive(Clone, Default)]
pub struct CompositeConfigStore {
    stores: Vec<Arc<dyn ConfigStore>>,
}

impl CompositeConfigStore {
    pub fn new(stores: Vec<Arc<dyn ConfigStore>>) -> Self {
        Self { stores }
    }

    /// Append a store with the lowest precedence so far.
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn stores(&self) -> &[Arc<dyn ConfigStore>] {
        &self.stores
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for CompositeConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeConfigStore")
            .field("stores", &self.stores.len())
            .finish()
    }
}

impl ConfigStore for CompositeConfigStore {
    fn get_config(&self, key: &str) -> Option<Arc<Config>> {
        self.stores.iter().find_map(|store| store.get_config(key))
    }

    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue> {
        self.stores
            .iter()
            .find_map(|store| store.get_context_value(property_name))
    }

    fn project_env_id(&self) -> Option<i64> {
        self.stores.iter().find_map(|store| store.project_env_id())
    }

    fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys: Vec<String> = self
            .stores
            .iter()
            .flat_map(|store| store.keys())
            .filter(|key| seen.insert(key.clone()))
            .collect();
        keys.sort();
        keys
    }

    fn is_initialized(&self) -> bool {
        self.stores.iter().all(|store| store.is_initialized())
    }
}

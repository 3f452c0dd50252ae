//! In-memory store built from literal values.

use super::{ConfigMap, ConfigStore};
use crate::config::Config;
use crate::value::ConfigValue;
use std::sync::Arc;

/// Read-only store built from a literal mapping, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    configs: ConfigMap,
    project_env_id: Option<i64>,
}

impl MemoryConfigStore {
    /// Build from `(key, value)` pairs. Each value becomes a constant config;
    /// booleans become feature flags.
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let configs = values
            .into_iter()
            .map(|(key, value)| Config::constant(0, key, value));
        Self {
            configs: ConfigMap::from_configs(configs),
            project_env_id: None,
        }
    }

    /// Build from fully formed configs bound to an optional environment.
    pub fn from_configs(configs: Vec<Config>, project_env_id: Option<i64>) -> Self {
        Self {
            configs: ConfigMap::from_configs(configs),
            project_env_id,
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.len() == 0
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_config(&self, key: &str) -> Option<Arc<Config>> {
        self.configs.get(key)
    }

    fn project_env_id(&self) -> Option<i64> {
        self.project_env_id
    }

    fn keys(&self) -> Vec<String> {
        self.configs.keys()
    }
}

//! Store loaded from a binary `ConfigDump`.

use super::{ConfigMap, ConfigStore};
use crate::config::Config;
use crate::error::Result;
use crate::wire;
use prost::Message;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only store built from a protobuf dump, bound to one environment.
#[derive(Debug, Clone)]
pub struct DumpConfigStore {
    configs: ConfigMap,
    project_env_id: i64,
}

impl DumpConfigStore {
    /// Read a dump file.
    pub fn load(path: impl AsRef<Path>, project_env_id: i64) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let store = Self::from_bytes(&bytes, project_env_id)?;
        debug!(
            path = %path.display(),
            project_env_id,
            configs = store.configs.len(),
            "Loaded config dump"
        );
        Ok(store)
    }

    /// Decode a dump. Deleted wrappers are dropped.
    pub fn from_bytes(bytes: &[u8], project_env_id: i64) -> Result<Self> {
        let dump = wire::ConfigDump::decode(bytes)?;

        let configs = dump
            .wrappers
            .into_iter()
            .filter(|wrapper| !wrapper.deleted)
            .filter_map(|wrapper| wrapper.config)
            .filter_map(|wire_config| {
                let key = wire_config.key.clone();
                match Config::try_from(wire_config) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping undecodable config in dump");
                        None
                    }
                }
            });

        Ok(Self {
            configs: ConfigMap::from_configs(configs),
            project_env_id,
        })
    }

    /// Encode configs as a dump, the inverse of [`DumpConfigStore::from_bytes`].
    pub fn encode<'a>(configs: impl IntoIterator<Item = &'a Config>) -> Vec<u8> {
        wire::ConfigDump {
            wrappers: configs
                .into_iter()
                .map(|config| wire::ConfigWrapper {
                    config: Some(config.into()),
                    deleted: false,
                    created_at: 0,
                })
                .collect(),
        }
        .encode_to_vec()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.len() == 0
    }
}

impl ConfigStore for DumpConfigStore {
    fn get_config(&self, key: &str) -> Option<Arc<Config>> {
        self.configs.get(key)
    }

    fn project_env_id(&self) -> Option<i64> {
        Some(self.project_env_id)
    }

    fn keys(&self) -> Vec<String> {
        self.configs.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConditionalValue, ConfigRow, ConfigType};

    fn sample_configs() -> Vec<Config> {
        vec![
            Config::constant(1, "greeting", "hello"),
            Config::new(2, "timeout", ConfigType::Config)
                .with_row(ConfigRow::for_env(7, vec![ConditionalValue::always(5i64)]))
                .with_row(ConfigRow::fallback(vec![ConditionalValue::always(30i64)])),
        ]
    }

    #[test]
    fn test_dump_round_trip_preserves_configs() {
        let configs = sample_configs();
        let bytes = DumpConfigStore::encode(&configs);
        let store = DumpConfigStore::from_bytes(&bytes, 7).unwrap();

        assert_eq!(store.project_env_id(), Some(7));
        for config in &configs {
            assert_eq!(store.get_config(&config.key).as_deref(), Some(config));
        }
    }

    #[test]
    fn test_deleted_wrappers_are_dropped() {
        let configs = sample_configs();
        let dump = wire::ConfigDump {
            wrappers: vec![
                wire::ConfigWrapper {
                    config: Some((&configs[0]).into()),
                    deleted: false,
                    created_at: 10,
                },
                wire::ConfigWrapper {
                    config: Some((&configs[1]).into()),
                    deleted: true,
                    created_at: 11,
                },
            ],
        };

        let store = DumpConfigStore::from_bytes(&dump.encode_to_vec(), 1).unwrap();
        assert_eq!(store.keys(), vec!["greeting".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs.dump");
        fs::write(&path, DumpConfigStore::encode(&sample_configs())).unwrap();

        let store = DumpConfigStore::load(&path, 7).unwrap();
        assert_eq!(store.len(), 2);
        assert!(DumpConfigStore::load(dir.path().join("missing"), 7).is_err());
    }
}

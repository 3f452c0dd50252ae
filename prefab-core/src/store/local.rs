//! Store loaded from a local YAML file.
//!
//! Nested mappings flatten into dotted keys. Inside a mapping the key `_`
//! holds the value of the mapping's own path, so
//!
//! ```yaml
//! db:
//!   _: primary
//!   pool: 10
//! ```
//!
//! yields `db = "primary"` and `db.pool = 10`. A mapping carrying
//! `feature_flag: true` and `value` becomes a feature flag, optionally
//! targeted with `criterion: {operator, property, values}`. Everything under
//! the top-level `log-level` key becomes a log level config.

use super::{ConfigMap, ConfigStore};
use crate::config::{
    ConditionalValue, Config, ConfigRow, ConfigType, Criterion, Operator, value_type_of,
};
use crate::error::{PrefabError, Result};
use crate::value::{ConfigValue, LogLevel};
use serde_yaml::{Mapping, Value as Yaml};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const LOG_LEVEL_PREFIX: &str = "log-level";
const SELF_KEY: &str = "_";

/// Read-only store parsed from a YAML document.
#[derive(Debug, Clone, Default)]
pub struct LocalConfigStore {
    configs: ConfigMap,
    source: Option<PathBuf>,
}

impl LocalConfigStore {
    /// Load and parse a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut store = Self::from_yaml_str(&content)?;
        store.source = Some(path.to_path_buf());
        debug!(path = %path.display(), configs = store.len(), "Loaded local config file");
        Ok(store)
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let document: Yaml = serde_yaml::from_str(content)
            .map_err(|e| PrefabError::Parse(format!("YAML parse error: {}", e)))?;

        let mut configs = Vec::new();
        match document {
            Yaml::Mapping(mapping) => flatten_mapping("", &mapping, &mut configs)?,
            Yaml::Null => {}
            _ => {
                return Err(PrefabError::Parse(
                    "config file must contain a mapping at the top level".to_string(),
                ));
            }
        }

        Ok(Self {
            configs: ConfigMap::from_configs(configs),
            source: None,
        })
    }

    /// File this store was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.len() == 0
    }
}

impl ConfigStore for LocalConfigStore {
    fn get_config(&self, key: &str) -> Option<Arc<Config>> {
        self.configs.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.configs.keys()
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    match (prefix.is_empty(), key == SELF_KEY) {
        (_, true) => prefix.to_string(),
        (true, false) => key.to_string(),
        (false, false) => format!("{}.{}", prefix, key),
    }
}

fn key_string(key: &Yaml) -> Result<String> {
    match key {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(PrefabError::Parse(format!("unsupported mapping key: {:?}", other))),
    }
}

fn is_log_level_path(path: &str) -> bool {
    path == LOG_LEVEL_PREFIX || path.starts_with("log-level.")
}

fn flatten_mapping(prefix: &str, mapping: &Mapping, out: &mut Vec<Config>) -> Result<()> {
    if mapping.contains_key("feature_flag") && !prefix.is_empty() {
        out.push(feature_flag(prefix, mapping)?);
        return Ok(());
    }

    for (key, node) in mapping {
        let path = join_key(prefix, &key_string(key)?);
        if path.is_empty() {
            continue;
        }
        match node {
            Yaml::Mapping(nested) => flatten_mapping(&path, nested, out)?,
            Yaml::Null => {}
            leaf if is_log_level_path(&path) => out.push(log_level(&path, leaf)?),
            leaf => out.push(plain(&path, scalar_value(&path, leaf)?)),
        }
    }
    Ok(())
}

fn single_value_config(
    key: &str,
    config_type: ConfigType,
    criteria: Vec<Criterion>,
    value: ConfigValue,
) -> Config {
    let value_type = value_type_of(&value);
    Config::new(0, key, config_type)
        .with_value_type(value_type)
        .with_row(ConfigRow::fallback(vec![ConditionalValue::new(criteria, value)]))
}

fn plain(key: &str, value: ConfigValue) -> Config {
    single_value_config(key, ConfigType::Config, Vec::new(), value)
}

fn log_level(key: &str, node: &Yaml) -> Result<Config> {
    let level = match node {
        Yaml::String(name) => name.parse::<LogLevel>()?,
        other => {
            return Err(PrefabError::Parse(format!(
                "log level for {} must be a string, got {:?}",
                key, other
            )));
        }
    };
    Ok(single_value_config(
        key,
        ConfigType::LogLevel,
        Vec::new(),
        ConfigValue::log_level(level),
    ))
}

fn feature_flag(key: &str, mapping: &Mapping) -> Result<Config> {
    let value = mapping
        .get("value")
        .ok_or_else(|| PrefabError::InvalidConfig(format!("feature flag {} has no value", key)))?;
    let value = scalar_value(key, value)?;

    let criteria = match mapping.get("criterion") {
        Some(Yaml::Mapping(criterion)) => vec![criterion_from_yaml(key, criterion)?],
        Some(other) => {
            return Err(PrefabError::Parse(format!(
                "criterion for {} must be a mapping, got {:?}",
                key, other
            )));
        }
        None => Vec::new(),
    };

    Ok(single_value_config(key, ConfigType::FeatureFlag, criteria, value))
}

fn criterion_from_yaml(key: &str, criterion: &Mapping) -> Result<Criterion> {
    let operator = criterion
        .get("operator")
        .cloned()
        .ok_or_else(|| PrefabError::Parse(format!("criterion for {} has no operator", key)))?;
    let operator: Operator = serde_yaml::from_value(operator)
        .map_err(|e| PrefabError::Parse(format!("criterion for {}: {}", key, e)))?;

    let property_name = match criterion.get("property") {
        Some(Yaml::String(name)) => name.clone(),
        _ => String::new(),
    };

    let values = match criterion.get("values") {
        Some(Yaml::Sequence(items)) => items
            .iter()
            .map(|item| scalar_string(key, item))
            .collect::<Result<Vec<_>>>()?,
        Some(item) => vec![scalar_string(key, item)?],
        None => Vec::new(),
    };

    let value_to_match = match operator {
        Operator::AlwaysTrue | Operator::NotSet => None,
        Operator::HierarchicalMatch | Operator::InSeg | Operator::NotInSeg => {
            values.into_iter().next().map(ConfigValue::string)
        }
        _ => Some(ConfigValue::string_list(values)),
    };

    Ok(Criterion {
        operator,
        property_name,
        value_to_match,
    })
}

fn scalar_string(key: &str, node: &Yaml) -> Result<String> {
    match node {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => Err(PrefabError::Parse(format!(
            "expected a scalar under {}, got {:?}",
            key, other
        ))),
    }
}

fn scalar_value(key: &str, node: &Yaml) -> Result<ConfigValue> {
    match node {
        Yaml::Bool(b) => Ok(ConfigValue::bool(*b)),
        Yaml::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(int), _) => Ok(ConfigValue::int(int)),
            (None, Some(float)) => Ok(ConfigValue::double(float)),
            _ => Err(PrefabError::Parse(format!("number out of range under {}", key))),
        },
        Yaml::String(s) => Ok(ConfigValue::string(s.clone())),
        Yaml::Sequence(items) => Ok(ConfigValue::string_list(
            items
                .iter()
                .map(|item| scalar_string(key, item))
                .collect::<Result<Vec<_>>>()?,
        )),
        other => Err(PrefabError::Parse(format!(
            "unsupported value under {}: {:?}",
            key, other
        ))),
    }
}

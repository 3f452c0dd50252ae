//! Config records and their targeting rows.

use crate::context::ContextSet;
use crate::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigType {
    NotSet,
    Config,
    FeatureFlag,
    LogLevel,
    Segment,
}

/// Declared value type of a config, used to coerce provided values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    NotSet,
    Int,
    String,
    Bytes,
    Double,
    Bool,
    LogLevel,
    StringList,
    IntRange,
    Duration,
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::NotSet => "NOT_SET",
            ValueType::Int => "INT",
            ValueType::String => "STRING",
            ValueType::Bytes => "BYTES",
            ValueType::Double => "DOUBLE",
            ValueType::Bool => "BOOL",
            ValueType::LogLevel => "LOG_LEVEL",
            ValueType::StringList => "STRING_LIST",
            ValueType::IntRange => "INT_RANGE",
            ValueType::Duration => "DURATION",
            ValueType::Json => "JSON",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criterion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    NotSet,
    AlwaysTrue,
    PropIsOneOf,
    PropIsNotOneOf,
    PropEndsWithOneOf,
    PropDoesNotEndWithOneOf,
    HierarchicalMatch,
    InIntRange,
    InSeg,
    NotInSeg,
}

/// A single predicate over a context property.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub operator: Operator,
    pub property_name: String,
    pub value_to_match: Option<ConfigValue>,
}

impl Criterion {
    pub fn new(
        operator: Operator,
        property_name: impl Into<String>,
        value_to_match: impl Into<ConfigValue>,
    ) -> Self {
        Self {
            operator,
            property_name: property_name.into(),
            value_to_match: Some(value_to_match.into()),
        }
    }

    pub fn always_true() -> Self {
        Self {
            operator: Operator::AlwaysTrue,
            property_name: String::new(),
            value_to_match: None,
        }
    }

    /// Criterion matching members of the named segment.
    pub fn in_segment(segment_key: impl Into<String>) -> Self {
        Self::new(Operator::InSeg, "", ConfigValue::string(segment_key))
    }

    /// Criterion matching non-members of the named segment.
    pub fn not_in_segment(segment_key: impl Into<String>) -> Self {
        Self::new(Operator::NotInSeg, "", ConfigValue::string(segment_key))
    }
}

/// Criteria plus the value served when all of them hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalValue {
    pub criteria: Vec<Criterion>,
    pub value: ConfigValue,
}

impl ConditionalValue {
    pub fn new(criteria: Vec<Criterion>, value: impl Into<ConfigValue>) -> Self {
        Self {
            criteria,
            value: value.into(),
        }
    }

    /// Unconditional value.
    pub fn always(value: impl Into<ConfigValue>) -> Self {
        Self::new(Vec::new(), value)
    }
}

/// Conditional values scoped to one environment, or to none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRow {
    pub project_env_id: Option<i64>,
    pub values: Vec<ConditionalValue>,
}

impl ConfigRow {
    /// Row that applies to every environment.
    pub fn fallback(values: Vec<ConditionalValue>) -> Self {
        Self {
            project_env_id: None,
            values,
        }
    }

    /// Row bound to one environment.
    pub fn for_env(project_env_id: i64, values: Vec<ConditionalValue>) -> Self {
        Self {
            project_env_id: Some(project_env_id),
            values,
        }
    }
}

/// A named, versioned config.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub id: i64,
    pub project_id: i64,
    pub key: String,
    pub config_type: ConfigType,
    pub value_type: ValueType,
    pub rows: Vec<ConfigRow>,
}

impl Config {
    pub fn new(id: i64, key: impl Into<String>, config_type: ConfigType) -> Self {
        Self {
            id,
            project_id: 0,
            key: key.into(),
            config_type,
            value_type: ValueType::NotSet,
            rows: Vec::new(),
        }
    }

    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_row(mut self, row: ConfigRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Config whose single fallback row always serves `value`.
    pub fn constant(id: i64, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        let value = value.into();
        let config_type = if value.as_bool().is_some() {
            ConfigType::FeatureFlag
        } else {
            ConfigType::Config
        };
        let value_type = value_type_of(&value);
        Self::new(id, key, config_type)
            .with_value_type(value_type)
            .with_row(ConfigRow::fallback(vec![ConditionalValue::always(value)]))
    }

    /// A config with no rows deletes the stored record.
    pub fn is_tombstone(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Infer the declared value type from a value's tag.
pub fn value_type_of(value: &ConfigValue) -> ValueType {
    use crate::value::Value;
    match value.value {
        Value::Int(_) => ValueType::Int,
        Value::Double(_) => ValueType::Double,
        Value::Bool(_) => ValueType::Bool,
        Value::String(_) => ValueType::String,
        Value::StringList(_) => ValueType::StringList,
        Value::Bytes(_) => ValueType::Bytes,
        Value::Duration(_) => ValueType::Duration,
        Value::LogLevel(_) => ValueType::LogLevel,
        Value::Json(_) => ValueType::Json,
        Value::IntRange(_) => ValueType::IntRange,
        Value::WeightedValues(_) | Value::Provided(_) => ValueType::NotSet,
    }
}

/// A batch of configs delivered to a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub configs: Vec<Config>,
    pub project_env_id: Option<i64>,
    pub default_context: Option<ContextSet>,
}

impl Snapshot {
    pub fn new(configs: Vec<Config>) -> Self {
        Self {
            configs,
            ..Default::default()
        }
    }

    pub fn with_project_env_id(mut self, project_env_id: i64) -> Self {
        self.project_env_id = Some(project_env_id);
        self
    }

    pub fn with_default_context(mut self, context: ContextSet) -> Self {
        self.default_context = Some(context);
        self
    }
}

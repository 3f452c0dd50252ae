//! Conversions between wire messages and the domain model.

use crate::config::{
    ConditionalValue, Config, ConfigRow, ConfigType, Criterion, Operator, Snapshot, ValueType,
};
use crate::context::{Context, ContextSet};
use crate::error::{PrefabError, Result};
use crate::value::{
    ConfigValue, IntRange, LogLevel, Provided, ProvidedSource, Value, WeightedValue,
    WeightedValues,
};
use crate::wire;
use prost::Message;
use tracing::warn;

impl TryFrom<wire::ConfigValue> for ConfigValue {
    type Error = PrefabError;

    fn try_from(wire_value: wire::ConfigValue) -> Result<Self> {
        use wire::config_value::Type;

        let value = match wire_value.r#type {
            Some(Type::Int(n)) => Value::Int(n),
            Some(Type::String(s)) => Value::String(s),
            Some(Type::Bytes(b)) => Value::Bytes(b),
            Some(Type::Double(n)) => Value::Double(n),
            Some(Type::Bool(b)) => Value::Bool(b),
            Some(Type::WeightedValues(weighted)) => {
                let values = weighted
                    .weighted_values
                    .into_iter()
                    .map(|entry| {
                        let value = entry.value.ok_or_else(|| {
                            PrefabError::InvalidConfig("weighted value without value".to_string())
                        })?;
                        Ok(WeightedValue {
                            weight: entry.weight,
                            value: value.try_into()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Value::WeightedValues(WeightedValues::new(
                    values,
                    weighted.hash_by_property_name,
                )?)
            }
            Some(Type::LogLevel(level)) => Value::LogLevel(log_level_from_wire(level)?),
            Some(Type::StringList(list)) => Value::StringList(list.values),
            Some(Type::IntRange(range)) => Value::IntRange(IntRange::new(range.start, range.end)),
            Some(Type::Provided(provided)) => {
                let source = match provided
                    .source
                    .and_then(|s| wire::ProvidedSource::try_from(s).ok())
                {
                    Some(wire::ProvidedSource::EnvVar) => ProvidedSource::EnvVar,
                    _ => ProvidedSource::NotSet,
                };
                Value::Provided(Provided {
                    source,
                    lookup: provided.lookup.unwrap_or_default(),
                })
            }
            Some(Type::Json(json)) => Value::Json(json.json),
            Some(Type::Duration(duration)) => Value::Duration(duration.definition),
            None => {
                return Err(PrefabError::InvalidConfig(
                    "config value has no type".to_string(),
                ));
            }
        };

        Ok(ConfigValue {
            value,
            confidential: wire_value.confidential.unwrap_or(false),
            decrypt_with: wire_value.decrypt_with.filter(|k| !k.is_empty()),
        })
    }
}

impl From<&ConfigValue> for wire::ConfigValue {
    fn from(value: &ConfigValue) -> Self {
        use wire::config_value::Type;

        let r#type = match &value.value {
            Value::Int(n) => Type::Int(*n),
            Value::Double(n) => Type::Double(*n),
            Value::Bool(b) => Type::Bool(*b),
            Value::String(s) => Type::String(s.clone()),
            Value::StringList(list) => Type::StringList(wire::StringList {
                values: list.clone(),
            }),
            Value::Bytes(b) => Type::Bytes(b.clone()),
            Value::Duration(definition) => Type::Duration(wire::IsoDuration {
                definition: definition.clone(),
            }),
            Value::LogLevel(level) => Type::LogLevel(log_level_to_wire(*level) as i32),
            Value::Json(json) => Type::Json(wire::Json { json: json.clone() }),
            Value::IntRange(range) => Type::IntRange(wire::IntRange {
                start: range.start,
                end: range.end,
            }),
            Value::WeightedValues(weighted) => Type::WeightedValues(wire::WeightedValues {
                weighted_values: weighted
                    .values
                    .iter()
                    .map(|entry| wire::WeightedValue {
                        weight: entry.weight,
                        value: Some((&entry.value).into()),
                    })
                    .collect(),
                hash_by_property_name: weighted.hash_by_property_name.clone(),
            }),
            Value::Provided(provided) => Type::Provided(wire::Provided {
                source: Some(match provided.source {
                    ProvidedSource::EnvVar => wire::ProvidedSource::EnvVar as i32,
                    ProvidedSource::NotSet => wire::ProvidedSource::NotSet as i32,
                }),
                lookup: Some(provided.lookup.clone()),
            }),
        };

        wire::ConfigValue {
            confidential: value.confidential.then_some(true),
            decrypt_with: value.decrypt_with.clone(),
            r#type: Some(r#type),
        }
    }
}

fn log_level_from_wire(level: i32) -> Result<LogLevel> {
    match wire::LogLevel::try_from(level) {
        Ok(wire::LogLevel::Trace) => Ok(LogLevel::Trace),
        Ok(wire::LogLevel::Debug) => Ok(LogLevel::Debug),
        Ok(wire::LogLevel::Info) => Ok(LogLevel::Info),
        Ok(wire::LogLevel::Warn) => Ok(LogLevel::Warn),
        Ok(wire::LogLevel::Error) => Ok(LogLevel::Error),
        Ok(wire::LogLevel::Fatal) => Ok(LogLevel::Fatal),
        _ => Err(PrefabError::InvalidConfig(format!(
            "unsupported log level {level}"
        ))),
    }
}

fn log_level_to_wire(level: LogLevel) -> wire::LogLevel {
    match level {
        LogLevel::Trace => wire::LogLevel::Trace,
        LogLevel::Debug => wire::LogLevel::Debug,
        LogLevel::Info => wire::LogLevel::Info,
        LogLevel::Warn => wire::LogLevel::Warn,
        LogLevel::Error => wire::LogLevel::Error,
        LogLevel::Fatal => wire::LogLevel::Fatal,
    }
}

impl From<i32> for ConfigType {
    fn from(raw: i32) -> Self {
        match wire::ConfigType::try_from(raw) {
            Ok(wire::ConfigType::Config) => ConfigType::Config,
            Ok(wire::ConfigType::FeatureFlag) => ConfigType::FeatureFlag,
            Ok(wire::ConfigType::LogLevel) => ConfigType::LogLevel,
            Ok(wire::ConfigType::Segment) => ConfigType::Segment,
            _ => ConfigType::NotSet,
        }
    }
}

impl From<ConfigType> for wire::ConfigType {
    fn from(config_type: ConfigType) -> Self {
        match config_type {
            ConfigType::NotSet => wire::ConfigType::NotSetConfigType,
            ConfigType::Config => wire::ConfigType::Config,
            ConfigType::FeatureFlag => wire::ConfigType::FeatureFlag,
            ConfigType::LogLevel => wire::ConfigType::LogLevel,
            ConfigType::Segment => wire::ConfigType::Segment,
        }
    }
}

impl From<i32> for ValueType {
    fn from(raw: i32) -> Self {
        match wire::ValueType::try_from(raw) {
            Ok(wire::ValueType::Int) => ValueType::Int,
            Ok(wire::ValueType::String) => ValueType::String,
            Ok(wire::ValueType::Bytes) => ValueType::Bytes,
            Ok(wire::ValueType::Double) => ValueType::Double,
            Ok(wire::ValueType::Bool) => ValueType::Bool,
            Ok(wire::ValueType::LogLevel) => ValueType::LogLevel,
            Ok(wire::ValueType::StringList) => ValueType::StringList,
            Ok(wire::ValueType::IntRange) => ValueType::IntRange,
            Ok(wire::ValueType::Duration) => ValueType::Duration,
            Ok(wire::ValueType::Json) => ValueType::Json,
            _ => ValueType::NotSet,
        }
    }
}

impl From<ValueType> for wire::ValueType {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::NotSet => wire::ValueType::NotSetValueType,
            ValueType::Int => wire::ValueType::Int,
            ValueType::String => wire::ValueType::String,
            ValueType::Bytes => wire::ValueType::Bytes,
            ValueType::Double => wire::ValueType::Double,
            ValueType::Bool => wire::ValueType::Bool,
            ValueType::LogLevel => wire::ValueType::LogLevel,
            ValueType::StringList => wire::ValueType::StringList,
            ValueType::IntRange => wire::ValueType::IntRange,
            ValueType::Duration => wire::ValueType::Duration,
            ValueType::Json => wire::ValueType::Json,
        }
    }
}

impl From<i32> for Operator {
    fn from(raw: i32) -> Self {
        use wire::CriterionOperator as Op;
        match Op::try_from(raw) {
            Ok(Op::AlwaysTrue) => Operator::AlwaysTrue,
            Ok(Op::PropIsOneOf) => Operator::PropIsOneOf,
            Ok(Op::PropIsNotOneOf) => Operator::PropIsNotOneOf,
            Ok(Op::PropEndsWithOneOf) => Operator::PropEndsWithOneOf,
            Ok(Op::PropDoesNotEndWithOneOf) => Operator::PropDoesNotEndWithOneOf,
            Ok(Op::HierarchicalMatch) => Operator::HierarchicalMatch,
            Ok(Op::InIntRange) => Operator::InIntRange,
            Ok(Op::InSeg) => Operator::InSeg,
            Ok(Op::NotInSeg) => Operator::NotInSeg,
            _ => Operator::NotSet,
        }
    }
}

impl From<Operator> for wire::CriterionOperator {
    fn from(operator: Operator) -> Self {
        use wire::CriterionOperator as Op;
        match operator {
            Operator::NotSet => Op::NotSet,
            Operator::AlwaysTrue => Op::AlwaysTrue,
            Operator::PropIsOneOf => Op::PropIsOneOf,
            Operator::PropIsNotOneOf => Op::PropIsNotOneOf,
            Operator::PropEndsWithOneOf => Op::PropEndsWithOneOf,
            Operator::PropDoesNotEndWithOneOf => Op::PropDoesNotEndWithOneOf,
            Operator::HierarchicalMatch => Op::HierarchicalMatch,
            Operator::InIntRange => Op::InIntRange,
            Operator::InSeg => Op::InSeg,
            Operator::NotInSeg => Op::NotInSeg,
        }
    }
}

impl TryFrom<wire::Config> for Config {
    type Error = PrefabError;

    fn try_from(wire_config: wire::Config) -> Result<Self> {
        let rows = wire_config
            .rows
            .into_iter()
            .map(|row| {
                let values = row
                    .values
                    .into_iter()
                    .map(|cv| {
                        let value = cv.value.ok_or_else(|| {
                            PrefabError::InvalidConfig(format!(
                                "conditional value without value in {}",
                                wire_config.key
                            ))
                        })?;
                        let criteria = cv
                            .criteria
                            .into_iter()
                            .map(|c| {
                                Ok(Criterion {
                                    operator: Operator::from(c.operator),
                                    property_name: c.property_name,
                                    value_to_match: c
                                        .value_to_match
                                        .map(ConfigValue::try_from)
                                        .transpose()?,
                                })
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(ConditionalValue {
                            criteria,
                            value: value.try_into()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ConfigRow {
                    project_env_id: row.project_env_id,
                    values,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Config {
            id: wire_config.id,
            project_id: wire_config.project_id,
            key: wire_config.key,
            config_type: ConfigType::from(wire_config.config_type),
            value_type: ValueType::from(wire_config.value_type),
            rows,
        })
    }
}

impl From<&Config> for wire::Config {
    fn from(config: &Config) -> Self {
        wire::Config {
            id: config.id,
            project_id: config.project_id,
            key: config.key.clone(),
            rows: config
                .rows
                .iter()
                .map(|row| wire::ConfigRow {
                    project_env_id: row.project_env_id,
                    values: row
                        .values
                        .iter()
                        .map(|cv| wire::ConditionalValue {
                            criteria: cv
                                .criteria
                                .iter()
                                .map(|c| wire::Criterion {
                                    property_name: c.property_name.clone(),
                                    operator: wire::CriterionOperator::from(c.operator) as i32,
                                    value_to_match: c.value_to_match.as_ref().map(Into::into),
                                })
                                .collect(),
                            value: Some((&cv.value).into()),
                        })
                        .collect(),
                })
                .collect(),
            config_type: wire::ConfigType::from(config.config_type) as i32,
            value_type: wire::ValueType::from(config.value_type) as i32,
        }
    }
}

impl From<wire::ContextSet> for ContextSet {
    fn from(wire_set: wire::ContextSet) -> Self {
        wire_set
            .contexts
            .into_iter()
            .map(|wire_context| {
                let mut context = Context::new(wire_context.r#type.unwrap_or_default());
                for (key, value) in wire_context.values {
                    match ConfigValue::try_from(value) {
                        Ok(value) => context.insert(key, value),
                        Err(e) => warn!(property = %key, error = %e, "Skipping context value"),
                    }
                }
                context
            })
            .collect()
    }
}

impl From<&ContextSet> for wire::ContextSet {
    fn from(set: &ContextSet) -> Self {
        wire::ContextSet {
            contexts: set
                .iter()
                .map(|context| wire::Context {
                    r#type: Some(context.name().to_string()),
                    values: context
                        .properties()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.into()))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl Snapshot {
    /// Convert a wire payload, dropping configs that fail to convert.
    pub fn from_wire(configs: wire::Configs) -> Self {
        let converted = configs
            .configs
            .into_iter()
            .filter_map(|wire_config| {
                let key = wire_config.key.clone();
                match Config::try_from(wire_config) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Dropping config that failed to convert");
                        None
                    }
                }
            })
            .collect();

        Snapshot {
            configs: converted,
            project_env_id: configs.config_service_pointer.map(|p| p.project_env_id),
            default_context: configs.default_context.map(ContextSet::from),
        }
    }

    /// Decode a protobuf `Configs` payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_wire(wire::Configs::decode(bytes)?))
    }

    /// Encode as a protobuf `Configs` payload.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        wire::Configs {
            configs: self.configs.iter().map(Into::into).collect(),
            config_service_pointer: self.project_env_id.map(|project_env_id| {
                wire::ConfigServicePointer {
                    project_id: 0,
                    project_env_id,
                }
            }),
            default_context: self.default_context.as_ref().map(Into::into),
        }
        .encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config::new(12, "checkout.enabled", ConfigType::FeatureFlag)
            .with_value_type(ValueType::Bool)
            .with_row(ConfigRow::for_env(
                101,
                vec![ConditionalValue::new(
                    vec![Criterion::new(
                        Operator::PropEndsWithOneOf,
                        "user.email",
                        ConfigValue::string_list(["example.com"]),
                    )],
                    true,
                )],
            ))
            .with_row(ConfigRow::fallback(vec![ConditionalValue::always(false)]))
    }

    #[test]
    fn test_snapshot_survives_encoding() {
        let snapshot = Snapshot::new(vec![sample_config()])
            .with_project_env_id(101)
            .with_default_context(
                ContextSet::new().with_context(Context::new("prefab").with("host", "web-1")),
            );

        let decoded = Snapshot::decode(&snapshot.encode_to_vec()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_unknown_operator_becomes_not_set() {
        assert_eq!(Operator::from(999), Operator::NotSet);
        assert_eq!(Operator::from(wire::CriterionOperator::LookupKeyIn as i32), Operator::NotSet);
        assert_eq!(Operator::from(wire::CriterionOperator::InSeg as i32), Operator::InSeg);
    }

    #[test]
    fn test_invalid_config_is_dropped_from_snapshot() {
        let mut broken: wire::Config = (&sample_config()).into();
        broken.key = "broken".to_string();
        broken.rows[0].values[0].value = None;

        let payload = wire::Configs {
            configs: vec![broken, (&sample_config()).into()],
            config_service_pointer: None,
            default_context: None,
        };
        let snapshot = Snapshot::from_wire(payload);
        assert_eq!(snapshot.configs.len(), 1);
        assert_eq!(snapshot.configs[0].key, "checkout.enabled");
        assert_eq!(snapshot.project_env_id, None);
    }

    #[test]
    fn test_value_without_type_is_rejected() {
        let empty = wire::ConfigValue {
            confidential: None,
            decrypt_with: None,
            r#type: None,
        };
        assert!(ConfigValue::try_from(empty).is_err());
    }

    #[test]
    fn test_confidential_bits_survive() {
        let value = ConfigValue::string("cipher").with_decrypt_with("secrets.key").confidential();
        let wire_value: wire::ConfigValue = (&value).into();
        assert_eq!(ConfigValue::try_from(wire_value).unwrap(), value);
    }
}

//! Config values.
//!
//! [`ConfigValue`] is the tagged union every config, criterion and context
//! property is expressed in. Typed accessors never coerce between tags: asking
//! a `Double` for an int yields `None`.

use crate::duration;
use crate::env::{EnvLookup, ProcessEnv};
use crate::error::{PrefabError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A typed value plus its metadata bits.
#[derive(Clone, PartialEq)]
pub struct ConfigValue {
    /// The tagged payload.
    pub value: Value,
    /// Rendered redacted in logs and telemetry.
    pub confidential: bool,
    /// Key of the config whose string value decrypts this one.
    pub decrypt_with: Option<String>,
}

/// Value payload variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    StringList(Vec<String>),
    Bytes(Vec<u8>),
    /// ISO-8601 duration definition.
    Duration(String),
    LogLevel(LogLevel),
    /// Raw JSON text.
    Json(String),
    IntRange(IntRange),
    WeightedValues(WeightedValues),
    Provided(Provided),
}

/// Log level carried by `LOG_LEVEL` configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Get level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl FromStr for LogLevel {
    type Err = PrefabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(PrefabError::Parse(format!("unknown log level: {other:?}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open integer range `[start, end)`; absent bounds are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl IntRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    fn bounds(&self) -> (i64, i64) {
        (self.start.unwrap_or(i64::MIN), self.end.unwrap_or(i64::MAX))
    }

    /// Check whether an integer falls inside the range.
    pub fn contains_int(&self, n: i64) -> bool {
        let (start, end) = self.bounds();
        n >= start && n < end
    }

    /// Check whether a float falls inside the range.
    pub fn contains_float(&self, n: f64) -> bool {
        let (start, end) = self.bounds();
        n >= start as f64 && n < end as f64
    }
}

/// One arm of a weighted split.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedValue {
    pub weight: i32,
    pub value: ConfigValue,
}

/// A weighted split between several values.
///
/// Construction through [`WeightedValues::new`] enforces a non-empty list of
/// non-negative weights with a positive sum.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedValues {
    pub values: Vec<WeightedValue>,
    pub hash_by_property_name: Option<String>,
}

impl WeightedValues {
    pub fn new(values: Vec<WeightedValue>, hash_by_property_name: Option<String>) -> Result<Self> {
        let weighted = Self {
            values,
            hash_by_property_name,
        };
        weighted.validate()?;
        Ok(weighted)
    }

    /// Check the weight invariants.
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(PrefabError::InvalidConfig(
                "weighted values must have at least one entry".to_string(),
            ));
        }
        if self.values.iter().any(|v| v.weight < 0) {
            return Err(PrefabError::InvalidConfig(
                "weighted values must have non-negative weights".to_string(),
            ));
        }
        if self.total_weight() <= 0 {
            return Err(PrefabError::InvalidConfig(
                "weighted values must have a positive total weight".to_string(),
            ));
        }
        Ok(())
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> i64 {
        self.values.iter().map(|v| v.weight as i64).sum()
    }
}

/// Where a provided value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvidedSource {
    NotSet,
    EnvVar,
}

/// A value read from outside the config payload at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provided {
    pub source: ProvidedSource,
    pub lookup: String,
}

impl Provided {
    pub fn env_var(name: impl Into<String>) -> Self {
        Self {
            source: ProvidedSource::EnvVar,
            lookup: name.into(),
        }
    }
}

/// Native form of a value, used by [`ConfigValue::extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    StringList(Vec<String>),
    Bytes(Vec<u8>),
    Duration(Duration),
    LogLevel(LogLevel),
    Json(serde_json::Value),
    IntRange(IntRange),
}

impl ConfigValue {
    /// Create a non-confidential value.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            confidential: false,
            decrypt_with: None,
        }
    }

    /// Mark the value confidential.
    pub fn confidential(mut self) -> Self {
        self.confidential = true;
        self
    }

    /// Name the config holding the decryption key for this value.
    pub fn with_decrypt_with(mut self, key: impl Into<String>) -> Self {
        self.decrypt_with = Some(key.into());
        self
    }

    pub fn int(n: i64) -> Self {
        Self::new(Value::Int(n))
    }

    pub fn double(n: f64) -> Self {
        Self::new(Value::Double(n))
    }

    pub fn bool(b: bool) -> Self {
        Self::new(Value::Bool(b))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Value::String(s.into()))
    }

    pub fn string_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Value::StringList(values.into_iter().map(Into::into).collect()))
    }

    pub fn duration(definition: impl Into<String>) -> Self {
        Self::new(Value::Duration(definition.into()))
    }

    pub fn json(text: impl Into<String>) -> Self {
        Self::new(Value::Json(text.into()))
    }

    pub fn log_level(level: LogLevel) -> Self {
        Self::new(Value::LogLevel(level))
    }

    pub fn int_range(start: Option<i64>, end: Option<i64>) -> Self {
        Self::new(Value::IntRange(IntRange::new(start, end)))
    }

    pub fn weighted(values: WeightedValues) -> Self {
        Self::new(Value::WeightedValues(values))
    }

    pub fn provided(provided: Provided) -> Self {
        Self::new(Value::Provided(provided))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match &self.value {
            Value::StringList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Parse a `Duration` value; malformed definitions yield `None`.
    pub fn as_duration(&self) -> Option<Duration> {
        match &self.value {
            Value::Duration(definition) => duration::parse_iso8601(definition).ok(),
            _ => None,
        }
    }

    pub fn as_log_level(&self) -> Option<LogLevel> {
        match self.value {
            Value::LogLevel(level) => Some(level),
            _ => None,
        }
    }

    /// Parse a `Json` value; malformed text yields `None`.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match &self.value {
            Value::Json(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    pub fn as_int_range(&self) -> Option<IntRange> {
        match self.value {
            Value::IntRange(range) => Some(range),
            _ => None,
        }
    }

    pub fn as_weighted_values(&self) -> Option<&WeightedValues> {
        match &self.value {
            Value::WeightedValues(weighted) => Some(weighted),
            _ => None,
        }
    }

    pub fn as_provided(&self) -> Option<&Provided> {
        match &self.value {
            Value::Provided(provided) => Some(provided),
            _ => None,
        }
    }

    /// Short name of the variant, as used by the telemetry shape codes.
    pub fn type_name(&self) -> &'static str {
        match self.value {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::StringList(_) => "string_list",
            Value::Bytes(_) => "bytes",
            Value::Duration(_) => "duration",
            Value::LogLevel(_) => "log_level",
            Value::Json(_) => "json",
            Value::IntRange(_) => "int_range",
            Value::WeightedValues(_) => "weighted_values",
            Value::Provided(_) => "provided",
        }
    }

    /// Convert to a native value, reading provided values from the process
    /// environment.
    pub fn extract(&self) -> Result<NativeValue> {
        self.extract_with(&ProcessEnv)
    }

    /// Convert to a native value using the given environment.
    pub fn extract_with(&self, env: &dyn EnvLookup) -> Result<NativeValue> {
        Ok(match &self.value {
            Value::Int(n) => NativeValue::Int(*n),
            Value::Double(n) => NativeValue::Double(*n),
            Value::Bool(b) => NativeValue::Bool(*b),
            Value::String(s) => NativeValue::String(s.clone()),
            Value::StringList(list) => NativeValue::StringList(list.clone()),
            Value::Bytes(bytes) => NativeValue::Bytes(bytes.clone()),
            Value::Duration(definition) => {
                NativeValue::Duration(duration::parse_iso8601(definition)?)
            }
            Value::LogLevel(level) => NativeValue::LogLevel(*level),
            Value::Json(text) => NativeValue::Json(
                serde_json::from_str(text).map_err(|e| PrefabError::Parse(e.to_string()))?,
            ),
            Value::IntRange(range) => NativeValue::IntRange(*range),
            Value::Provided(provided) => match provided.source {
                ProvidedSource::EnvVar => NativeValue::String(
                    env.lookup(&provided.lookup)
                        .ok_or_else(|| PrefabError::EnvVarNotExist(provided.lookup.clone()))?,
                ),
                ProvidedSource::NotSet => {
                    return Err(PrefabError::InvalidConfig(
                        "provided value has no source".to_string(),
                    ));
                }
            },
            Value::WeightedValues(_) => {
                return Err(PrefabError::InvalidConfig(
                    "weighted values must be resolved before extraction".to_string(),
                ));
            }
        })
    }

    /// Plain rendering used for hashing and string comparisons.
    ///
    /// Unlike `Display` this never redacts.
    pub fn raw_string(&self) -> String {
        match &self.value {
            Value::Int(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::String(s) | Value::Duration(s) | Value::Json(s) => s.clone(),
            Value::StringList(list) => format!("[{}]", list.join(" ")),
            Value::Bytes(bytes) => hex::encode(bytes),
            Value::LogLevel(level) => level.as_str().to_string(),
            Value::IntRange(range) => format!(
                "[{}, {})",
                range.start.map_or_else(|| "-inf".to_string(), |n| n.to_string()),
                range.end.map_or_else(|| "inf".to_string(), |n| n.to_string())
            ),
            Value::WeightedValues(weighted) => format!("weighted({})", weighted.values.len()),
            Value::Provided(provided) => format!("provided({})", provided.lookup),
        }
    }

    /// Copy of this value safe to log or report.
    pub fn redacted(&self) -> ConfigValue {
        if !self.confidential {
            return self.clone();
        }
        ConfigValue {
            value: Value::String(redact(&self.raw_string())),
            confidential: true,
            decrypt_with: None,
        }
    }
}

/// Redacted marker: `*****` plus the first five hex chars of the SHA-256.
pub fn redact(raw: &str) -> String {
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    format!("*****{}", &digest[..5])
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.confidential {
            f.write_str(&redact(&self.raw_string()))
        } else {
            f.write_str(&self.raw_string())
        }
    }
}

impl fmt::Debug for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ConfigValue");
        if self.confidential {
            debug.field("value", &redact(&self.raw_string()));
        } else {
            debug.field("value", &self.value);
        }
        debug
            .field("confidential", &self.confidential)
            .field("decrypt_with", &self.decrypt_with)
            .finish()
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        Self::int(n)
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        Self::int(n as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        Self::double(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::bool(b)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::string(s)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(list: Vec<String>) -> Self {
        Self::new(Value::StringList(list))
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(list: Vec<&str>) -> Self {
        Self::string_list(list)
    }
}

impl From<LogLevel> for ConfigValue {
    fn from(level: LogLevel) -> Self {
        Self::log_level(level)
    }
}

impl From<Duration> for ConfigValue {
    fn from(d: Duration) -> Self {
        Self::duration(duration::to_iso8601(d))
    }
}

impl From<NativeValue> for ConfigValue {
    fn from(native: NativeValue) -> Self {
        match native {
            NativeValue::Int(n) => Self::int(n),
            NativeValue::Double(n) => Self::double(n),
            NativeValue::Bool(b) => Self::bool(b),
            NativeValue::String(s) => Self::string(s),
            NativeValue::StringList(list) => Self::new(Value::StringList(list)),
            NativeValue::Bytes(bytes) => Self::new(Value::Bytes(bytes)),
            NativeValue::Duration(d) => d.into(),
            NativeValue::LogLevel(level) => Self::log_level(level),
            NativeValue::Json(json) => Self::json(json.to_string()),
            NativeValue::IntRange(range) => Self::new(Value::IntRange(range)),
        }
    }
}

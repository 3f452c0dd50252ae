//! Protobuf wire messages.
//!
//! Declared by hand with `prost` derives so no build step is needed. Only the
//! fields this client reads or writes are declared; prost skips the rest when
//! decoding.

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigValue {
    #[prost(bool, optional, tag = "13")]
    pub confidential: Option<bool>,
    #[prost(string, optional, tag = "14")]
    pub decrypt_with: Option<String>,
    #[prost(
        oneof = "config_value::Type",
        tags = "1, 2, 3, 4, 5, 6, 9, 10, 11, 12, 15, 16"
    )]
    pub r#type: Option<config_value::Type>,
}

pub mod config_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(int64, tag = "1")]
        Int(i64),
        #[prost(string, tag = "2")]
        String(String),
        #[prost(bytes = "vec", tag = "3")]
        Bytes(Vec<u8>),
        #[prost(double, tag = "4")]
        Double(f64),
        #[prost(bool, tag = "5")]
        Bool(bool),
        #[prost(message, tag = "6")]
        WeightedValues(super::WeightedValues),
        #[prost(enumeration = "super::LogLevel", tag = "9")]
        LogLevel(i32),
        #[prost(message, tag = "10")]
        StringList(super::StringList),
        #[prost(message, tag = "11")]
        IntRange(super::IntRange),
        #[prost(message, tag = "12")]
        Provided(super::Provided),
        #[prost(message, tag = "15")]
        Json(super::Json),
        #[prost(message, tag = "16")]
        Duration(super::IsoDuration),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringList {
    #[prost(string, repeated, tag = "1")]
    pub values: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntRange {
    #[prost(int64, optional, tag = "1")]
    pub start: Option<i64>,
    #[prost(int64, optional, tag = "2")]
    pub end: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Json {
    #[prost(string, tag = "1")]
    pub json: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsoDuration {
    #[prost(string, tag = "1")]
    pub definition: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Provided {
    #[prost(enumeration = "ProvidedSource", optional, tag = "1")]
    pub source: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub lookup: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WeightedValue {
    #[prost(int32, tag = "1")]
    pub weight: i32,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ConfigValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WeightedValues {
    #[prost(message, repeated, tag = "1")]
    pub weighted_values: Vec<WeightedValue>,
    #[prost(string, optional, tag = "2")]
    pub hash_by_property_name: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Criterion {
    #[prost(string, tag = "1")]
    pub property_name: String,
    #[prost(enumeration = "CriterionOperator", tag = "2")]
    pub operator: i32,
    #[prost(message, optional, tag = "3")]
    pub value_to_match: Option<ConfigValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConditionalValue {
    #[prost(message, repeated, tag = "1")]
    pub criteria: Vec<Criterion>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ConfigValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigRow {
    #[prost(int64, optional, tag = "1")]
    pub project_env_id: Option<i64>,
    #[prost(message, repeated, tag = "2")]
    pub values: Vec<ConditionalValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Config {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub project_id: i64,
    #[prost(string, tag = "3")]
    pub key: String,
    #[prost(message, repeated, tag = "5")]
    pub rows: Vec<ConfigRow>,
    #[prost(enumeration = "ConfigType", tag = "7")]
    pub config_type: i32,
    #[prost(enumeration = "ValueType", tag = "9")]
    pub value_type: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigServicePointer {
    #[prost(int64, tag = "1")]
    pub project_id: i64,
    #[prost(int64, tag = "2")]
    pub project_env_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Configs {
    #[prost(message, repeated, tag = "1")]
    pub configs: Vec<Config>,
    #[prost(message, optional, tag = "2")]
    pub config_service_pointer: Option<ConfigServicePointer>,
    #[prost(message, optional, tag = "4")]
    pub default_context: Option<ContextSet>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Context {
    #[prost(string, optional, tag = "1")]
    pub r#type: Option<String>,
    #[prost(map = "string, message", tag = "2")]
    pub values: HashMap<String, ConfigValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContextSet {
    #[prost(message, repeated, tag = "1")]
    pub contexts: Vec<Context>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigWrapper {
    #[prost(message, optional, tag = "1")]
    pub config: Option<Config>,
    #[prost(bool, tag = "2")]
    pub deleted: bool,
    #[prost(int64, tag = "3")]
    pub created_at: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigDump {
    #[prost(message, repeated, tag = "1")]
    pub wrappers: Vec<ConfigWrapper>,
}

// Telemetry

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigEvaluationCounter {
    #[prost(int64, tag = "1")]
    pub count: i64,
    #[prost(int64, optional, tag = "2")]
    pub config_id: Option<i64>,
    #[prost(message, optional, tag = "3")]
    pub selected_value: Option<ConfigValue>,
    #[prost(uint32, optional, tag = "4")]
    pub config_row_index: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub conditional_value_index: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub weighted_value_index: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigEvaluationSummary {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(enumeration = "ConfigType", tag = "2")]
    pub r#type: i32,
    #[prost(message, repeated, tag = "3")]
    pub counters: Vec<ConfigEvaluationCounter>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigEvaluationSummaries {
    #[prost(int64, tag = "1")]
    pub start: i64,
    #[prost(int64, tag = "2")]
    pub end: i64,
    #[prost(message, repeated, tag = "3")]
    pub summaries: Vec<ConfigEvaluationSummary>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExampleContext {
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub context_set: Option<ContextSet>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExampleContexts {
    #[prost(message, repeated, tag = "1")]
    pub examples: Vec<ExampleContext>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContextShape {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(map = "string, int32", tag = "2")]
    pub field_types: HashMap<String, i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContextShapes {
    #[prost(message, repeated, tag = "1")]
    pub shapes: Vec<ContextShape>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TelemetryEvent {
    #[prost(oneof = "telemetry_event::Payload", tags = "2, 3, 6")]
    pub payload: Option<telemetry_event::Payload>,
}

pub mod telemetry_event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Summaries(super::ConfigEvaluationSummaries),
        #[prost(message, tag = "3")]
        ExampleContexts(super::ExampleContexts),
        #[prost(message, tag = "6")]
        ContextShapes(super::ContextShapes),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TelemetryEvents {
    #[prost(string, tag = "1")]
    pub instance_hash: String,
    #[prost(message, repeated, tag = "2")]
    pub events: Vec<TelemetryEvent>,
}

// Enumerations

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConfigType {
    NotSetConfigType = 0,
    Config = 1,
    FeatureFlag = 2,
    LogLevel = 3,
    Segment = 4,
    LimitDefinition = 5,
    Deleted = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    NotSetValueType = 0,
    Int = 1,
    String = 2,
    Bytes = 3,
    Double = 4,
    Bool = 5,
    LimitDefinition = 7,
    LogLevel = 9,
    StringList = 10,
    IntRange = 11,
    Duration = 12,
    Json = 13,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum LogLevel {
    NotSetLogLevel = 0,
    Trace = 1,
    Debug = 2,
    Info = 3,
    Warn = 5,
    Error = 6,
    Fatal = 9,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CriterionOperator {
    NotSet = 0,
    LookupKeyIn = 1,
    LookupKeyNotIn = 2,
    InSeg = 3,
    NotInSeg = 4,
    AlwaysTrue = 5,
    PropIsOneOf = 6,
    PropIsNotOneOf = 7,
    PropEndsWithOneOf = 8,
    PropDoesNotEndWithOneOf = 9,
    HierarchicalMatch = 10,
    InIntRange = 11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProvidedSource {
    NotSet = 0,
    EnvVar = 1,
}

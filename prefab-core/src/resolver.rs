//! Config resolution.
//!
//! The [`Resolver`] looks a key up in the store, runs the rule evaluator and
//! then post-processes the selected value: weighted splits are bucketed,
//! provided values are read from the environment and encrypted strings are
//! decrypted. Every match is reported to the registered listener.

use crate::config::{ConditionalValue, Config, ConfigType, ValueType};
use crate::context::{ContextChain, ContextSet, ContextValueGetter};
use crate::crypto::{AesGcmDecrypter, Decrypter};
use crate::env::{EnvLookup, ProcessEnv};
use crate::error::{PrefabError, Result};
use crate::evaluator::{DEFAULT_MAX_SEGMENT_DEPTH, RuleEvaluator};
use crate::store::{ConfigStore, StoreContext};
use crate::value::{ConfigValue, Provided, ProvidedSource, Value};
use crate::weighted::WeightedValuePicker;
use std::sync::Arc;
use tracing::trace;

/// Result of resolving one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigMatch {
    pub key: String,
    pub config: Arc<Config>,
    pub is_match: bool,
    /// Value chosen by the rule evaluator, before post-processing.
    pub original_match: Option<ConfigValue>,
    /// Final value handed to callers.
    pub value: Option<ConfigValue>,
    pub row_index: Option<usize>,
    pub conditional_value_index: Option<usize>,
    pub weighted_value_index: Option<usize>,
    pub selected_conditional_value: Option<ConditionalValue>,
}

impl ConfigMatch {
    pub fn config_type(&self) -> ConfigType {
        self.config.config_type
    }
}

/// Observer of resolutions, used to feed telemetry.
pub trait EvaluationListener: Send + Sync {
    /// Called with the context of every top-level resolution.
    fn on_context(&self, _context: &ContextSet) {}

    /// Called for every match except log level lookups.
    fn on_match(&self, _config_match: &ConfigMatch) {}
}

/// Resolves keys against a store.
pub struct Resolver {
    store: Arc<dyn ConfigStore>,
    decrypter: Arc<dyn Decrypter>,
    env: Arc<dyn EnvLookup>,
    listener: Option<Arc<dyn EvaluationListener>>,
    picker: WeightedValuePicker,
    max_depth: usize,
}

impl Resolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            decrypter: Arc::new(AesGcmDecrypter),
            env: Arc::new(ProcessEnv),
            listener: None,
            picker: WeightedValuePicker::new(),
            max_depth: DEFAULT_MAX_SEGMENT_DEPTH,
        }
    }

    pub fn with_decrypter(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.decrypter = decrypter;
        self
    }

    /// Environment used for provided values.
    pub fn with_env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.env = env;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn EvaluationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Seed the PRNG used for weighted splits without a hash property.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.picker = WeightedValuePicker::with_seed(seed);
        self
    }

    /// Limit nesting of segments and decryption keys.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Resolve a key for a context.
    pub fn resolve(&self, key: &str, context: &ContextSet) -> Result<ConfigMatch> {
        if let Some(listener) = &self.listener {
            listener.on_context(context);
        }

        let config_match = self.resolve_at_depth(key, context, 0)?;

        if let Some(listener) = &self.listener
            && config_match.config_type() != ConfigType::LogLevel
        {
            listener.on_match(&config_match);
        }
        Ok(config_match)
    }

    fn resolve_at_depth(
        &self,
        key: &str,
        context: &ContextSet,
        depth: usize,
    ) -> Result<ConfigMatch> {
        let config = self
            .store
            .get_config(key)
            .ok_or_else(|| PrefabError::ConfigDoesNotExist(key.to_string()))?;

        let store_context = StoreContext(self.store.as_ref());
        let chain = ContextChain::new(vec![
            context as &dyn ContextValueGetter,
            &store_context as &dyn ContextValueGetter,
        ]);
        let evaluation = RuleEvaluator::new(self.store.as_ref())
            .with_max_depth(self.max_depth)
            .evaluate(&config, &chain);

        let mut config_match = ConfigMatch {
            key: key.to_string(),
            config: config.clone(),
            is_match: evaluation.is_match,
            original_match: evaluation.value.clone(),
            value: None,
            row_index: evaluation.row_index,
            conditional_value_index: evaluation.conditional_value_index,
            weighted_value_index: None,
            selected_conditional_value: evaluation.selected_conditional_value,
        };

        let Some(selected) = evaluation.value else {
            trace!(key = %key, "No matching conditional value");
            return Ok(config_match);
        };

        let mut value = selected.clone();
        if let Some(weighted) = selected.as_weighted_values() {
            let (index, picked) = self.picker.pick(key, weighted, &chain).ok_or_else(|| {
                PrefabError::InvalidConfig(format!("empty weighted values in {}", key))
            })?;
            config_match.weighted_value_index = Some(index);
            value = picked.value.clone();
        }

        let mut decrypted = false;
        if let Some(provided) = value.as_provided() {
            value = self.provide(provided, config.value_type, value.confidential)?;
        } else if let (Some(ciphertext), Some(key_config)) =
            (value.as_str(), value.decrypt_with.as_deref())
        {
            value = self.decrypt(ciphertext, key_config, context, depth)?;
            decrypted = true;
        }

        if !decrypted && selected.confidential && value != selected {
            value.confidential = true;
        }

        config_match.value = Some(value);
        Ok(config_match)
    }

    fn provide(
        &self,
        provided: &Provided,
        value_type: ValueType,
        confidential: bool,
    ) -> Result<ConfigValue> {
        if provided.source != ProvidedSource::EnvVar {
            return Err(PrefabError::InvalidConfig(format!(
                "provided value {} has no source",
                provided.lookup
            )));
        }
        let raw = self
            .env
            .lookup(&provided.lookup)
            .ok_or_else(|| PrefabError::EnvVarNotExist(provided.lookup.clone()))?;

        let mut value = coerce(&provided.lookup, &raw, value_type)?;
        value.confidential = confidential;
        Ok(value)
    }

    fn decrypt(
        &self,
        ciphertext: &str,
        key_config: &str,
        context: &ContextSet,
        depth: usize,
    ) -> Result<ConfigValue> {
        if depth >= self.max_depth {
            return Err(PrefabError::DecryptionFailed(format!(
                "decryption key chain through {} is too deep",
                key_config
            )));
        }

        let key_match = self
            .resolve_at_depth(key_config, context, depth + 1)
            .map_err(|e| PrefabError::DecryptionFailed(format!("key {}: {}", key_config, e)))?;
        let secret_key = key_match
            .value
            .as_ref()
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| {
                PrefabError::DecryptionFailed(format!(
                    "key {} did not resolve to a string",
                    key_config
                ))
            })?;

        let plaintext = self.decrypter.decrypt(secret_key, ciphertext)?;
        Ok(ConfigValue::string(plaintext).confidential())
    }
}

/// Coerce an environment variable to a config's declared value type.
fn coerce(variable: &str, raw: &str, value_type: ValueType) -> Result<ConfigValue> {
    let failed = || PrefabError::TypeCoercionFailed {
        variable: variable.to_string(),
        value_type: value_type.to_string(),
    };

    Ok(match value_type {
        ValueType::NotSet | ValueType::String => ConfigValue::string(raw),
        ValueType::Int => ConfigValue::int(raw.trim().parse::<i64>().map_err(|_| failed())?),
        ValueType::Double => {
            ConfigValue::double(raw.trim().parse::<f64>().map_err(|_| failed())?)
        }
        ValueType::Bool => match raw.trim() {
            "true" => ConfigValue::bool(true),
            "false" => ConfigValue::bool(false),
            _ => return Err(failed()),
        },
        ValueType::Duration => ConfigValue::new(Value::Duration(raw.to_string())),
        ValueType::Json => ConfigValue::new(Value::Json(raw.to_string())),
        _ => return Err(failed()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigRow, Criterion, Operator};
    use crate::context::Context;
    use crate::env::MapEnv;
    use crate::store::MemoryConfigStore;
    use crate::value::{WeightedValue, WeightedValues};
    use parking_lot::Mutex;

    fn resolver(configs: Vec<Config>) -> Resolver {
        Resolver::new(Arc::new(MemoryConfigStore::from_configs(configs, None)))
    }

    fn provided_config(value_type: ValueType) -> Config {
        Config::new(1, "port", ConfigType::Config)
            .with_value_type(value_type)
            .with_row(ConfigRow::fallback(vec![ConditionalValue::always(
                ConfigValue::provided(Provided::env_var("PORT")),
            )]))
    }

    #[test]
    fn test_missing_key() {
        let err = resolver(vec![]).resolve("nope", &ContextSet::new()).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_provided_values_are_coerced() {
        let env = Arc::new(MapEnv::from_iter([("PORT", "8080")]));

        let int = resolver(vec![provided_config(ValueType::Int)]).with_env(env.clone());
        let m = int.resolve("port", &ContextSet::new()).unwrap();
        assert_eq!(m.value.and_then(|v| v.as_int()), Some(8080));

        let string = resolver(vec![provided_config(ValueType::NotSet)]).with_env(env.clone());
        let m = string.resolve("port", &ContextSet::new()).unwrap();
        assert_eq!(m.value, Some(ConfigValue::string("8080")));

        let boolean = resolver(vec![provided_config(ValueType::Bool)]).with_env(env.clone());
        assert!(matches!(
            boolean.resolve("port", &ContextSet::new()),
            Err(PrefabError::TypeCoercionFailed { .. })
        ));

        let unset =
            resolver(vec![provided_config(ValueType::Int)]).with_env(Arc::new(MapEnv::new()));
        assert!(matches!(
            unset.resolve("port", &ContextSet::new()),
            Err(PrefabError::EnvVarNotExist(name)) if name == "PORT"
        ));
    }

    #[test]
    fn test_provided_keeps_confidential_flag() {
        let token = ConfigValue::provided(Provided::env_var("TOKEN")).confidential();
        let config = Config::new(1, "token", ConfigType::Config)
            .with_row(ConfigRow::fallback(vec![ConditionalValue::always(token)]));
        let env = MapEnv::from_iter([("TOKEN", "s3cret")]);
        let resolver = resolver(vec![config]).with_env(Arc::new(env));
        let value = resolver.resolve("token", &ContextSet::new()).unwrap().value.unwrap();
        assert!(value.confidential);
        assert_eq!(value.as_str(), Some("s3cret"));
    }

    #[test]
    fn test_weighted_pick_is_recorded() {
        let weighted = WeightedValues::new(
            vec![
                WeightedValue { weight: 0, value: ConfigValue::string("never") },
                WeightedValue { weight: 1, value: ConfigValue::string("always") },
            ],
            None,
        )
        .unwrap();
        let config = Config::new(1, "split", ConfigType::FeatureFlag).with_row(ConfigRow::fallback(
            vec![ConditionalValue::always(ConfigValue::weighted(weighted))],
        ));

        let m = resolver(vec![config])
            .with_seed(3)
            .resolve("split", &ContextSet::new())
            .unwrap();
        assert_eq!(m.weighted_value_index, Some(1));
        assert_eq!(m.value, Some(ConfigValue::string("always")));
        assert!(m.original_match.unwrap().as_weighted_values().is_some());
    }

    #[test]
    fn test_decryption() {
        let key = "e657e0406fc22e17d3145966396b2130d33dcb30ac0edd62a77235cdd01fc49d";
        let payload = AesGcmDecrypter::encrypt(key, "the secret", &[1u8; 12]).unwrap();
        let secret = Config::constant(
            1,
            "app.secret",
            ConfigValue::string(payload).with_decrypt_with("secrets.key"),
        );

        let ok = resolver(vec![secret.clone(), Config::constant(2, "secrets.key", key)]);
        let value = ok.resolve("app.secret", &ContextSet::new()).unwrap().value.unwrap();
        assert_eq!(value.as_str(), Some("the secret"));
        assert!(value.confidential);

        let wrong_key = resolver(vec![
            secret.clone(),
            Config::constant(2, "secrets.key", "00".repeat(32)),
        ]);
        assert!(matches!(
            wrong_key.resolve("app.secret", &ContextSet::new()),
            Err(PrefabError::DecryptionFailed(_))
        ));

        let no_key = resolver(vec![secret]);
        assert!(matches!(
            no_key.resolve("app.secret", &ContextSet::new()),
            Err(PrefabError::DecryptionFailed(_))
        ));
    }

    #[derive(Default)]
    struct Recording {
        contexts: Mutex<usize>,
        matches: Mutex<Vec<String>>,
    }

    impl EvaluationListener for Recording {
        fn on_context(&self, _context: &ContextSet) {
            *self.contexts.lock() += 1;
        }

        fn on_match(&self, config_match: &ConfigMatch) {
            self.matches.lock().push(config_match.key.clone());
        }
    }

    #[test]
    fn test_listener_skips_log_levels() {
        let level = Config::new(1, "log-level", ConfigType::LogLevel).with_row(
            ConfigRow::fallback(vec![ConditionalValue::always(crate::value::LogLevel::Info)]),
        );
        let recording = Arc::new(Recording::default());
        let resolver = resolver(vec![level, Config::constant(2, "greeting", "hello")])
            .with_listener(recording.clone());

        resolver.resolve("log-level", &ContextSet::new()).unwrap();
        resolver.resolve("greeting", &ContextSet::new()).unwrap();

        assert_eq!(*recording.contexts.lock(), 2);
        assert_eq!(*recording.matches.lock(), vec!["greeting".to_string()]);
    }

    #[test]
    fn test_context_is_not_mutated() {
        let config = Config::new(1, "k", ConfigType::Config).with_row(ConfigRow::fallback(vec![
            ConditionalValue::new(
                vec![Criterion::new(
                    Operator::PropIsOneOf,
                    "user.key",
                    ConfigValue::string_list(["a"]),
                )],
                "matched",
            ),
        ]));
        let context = ContextSet::new().with_context(Context::new("user").with("key", "a"));
        let before = context.clone();

        let m = resolver(vec![config]).resolve("k", &context).unwrap();
        assert!(m.is_match);
        assert_eq!(context, before);
    }

    #[test]
    fn test_no_match_carries_no_value() {
        let config = Config::new(1, "k", ConfigType::Config).with_row(ConfigRow::fallback(vec![
            ConditionalValue::new(vec![Criterion::new(Operator::NotSet, "", "")], "never"),
        ]));
        let m = resolver(vec![config]).resolve("k", &ContextSet::new()).unwrap();
        assert!(!m.is_match);
        assert_eq!(m.value, None);
        assert_eq!(m.row_index, None);
    }
}

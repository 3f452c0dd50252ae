//! Evaluation contexts.
//!
//! A [`ContextSet`] holds named sub-contexts (`user`, `device`, ...), each a
//! map of property name to value. Criteria address properties with dotted
//! names: `user.email` reads property `email` of sub-context `user`, while a
//! name without a dot (or with a leading dot) reads the unnamed sub-context.

use crate::value::ConfigValue;
use std::collections::{BTreeMap, HashMap};

/// Anything criteria can read properties from.
pub trait ContextValueGetter {
    /// Look up a dotted property name.
    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue>;
}

/// Split a property name at its first dot into `(context name, key)`.
pub fn split_property_name(property_name: &str) -> (&str, &str) {
    property_name.split_once('.').unwrap_or(("", property_name))
}

/// A single named sub-context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl Context {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Add a property.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &HashMap<String, ConfigValue> {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Named sub-contexts, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSet {
    contexts: BTreeMap<String, Context>,
}

impl ContextSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sub-context, replacing any with the same name.
    pub fn with_context(mut self, context: Context) -> Self {
        self.add(context);
        self
    }

    pub fn add(&mut self, context: Context) {
        self.contexts.insert(context.name.clone(), context);
    }

    /// Replace the named sub-context with the given properties.
    pub fn set_named<I, K, V>(&mut self, name: impl Into<String>, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        let mut context = Context::new(name);
        for (key, value) in properties {
            context.insert(key, value);
        }
        self.add(context);
    }

    /// Look up a dotted property name.
    pub fn get(&self, property_name: &str) -> Option<&ConfigValue> {
        let (name, key) = split_property_name(property_name);
        self.contexts.get(name)?.get(key)
    }

    pub fn named(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Overlay `other` onto this set. Sub-contexts are replaced whole.
    pub fn merge_from(&mut self, other: &ContextSet) {
        for context in other.iter() {
            self.add(context.clone());
        }
    }

    /// Merge sets in order; later sets win per sub-context name.
    pub fn merge<'a>(sets: impl IntoIterator<Item = &'a ContextSet>) -> ContextSet {
        let mut merged = ContextSet::new();
        for set in sets {
            merged.merge_from(set);
        }
        merged
    }

    /// Stable identity built from each sub-context's `key` property:
    /// `name:key|name:key`, ordered by sub-context name.
    pub fn grouped_key(&self) -> String {
        self.contexts
            .values()
            .filter_map(|context| {
                context
                    .get("key")
                    .map(|key| format!("{}:{}", context.name, key.raw_string()))
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl FromIterator<Context> for ContextSet {
    fn from_iter<T: IntoIterator<Item = Context>>(iter: T) -> Self {
        let mut set = ContextSet::new();
        for context in iter {
            set.add(context);
        }
        set
    }
}

impl ContextValueGetter for ContextSet {
    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue> {
        self.get(property_name).cloned()
    }
}

/// Ordered chain of getters; the first one holding a property wins.
pub struct ContextChain<'a> {
    getters: Vec<&'a dyn ContextValueGetter>,
}

impl<'a> ContextChain<'a> {
    pub fn new(getters: Vec<&'a dyn ContextValueGetter>) -> Self {
        Self { getters }
    }
}

impl ContextValueGetter for ContextChain<'_> {
    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue> {
        self.getters
            .iter()
            .find_map(|getter| getter.get_context_value(property_name))
    }
}

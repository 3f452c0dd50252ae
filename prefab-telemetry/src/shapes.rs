//! Context shape aggregation.
//!
//! Records which properties each named sub-context carries and the type of
//! each property, coded as the config service expects.

use parking_lot::Mutex;
use prefab_core::wire;
use prefab_core::{ConfigValue, ContextSet, Value};
use std::collections::BTreeMap;

/// Type code reported for a property value.
pub fn shape_code(value: &ConfigValue) -> i32 {
    match value.value {
        Value::Int(_) => 1,
        Value::String(_) => 2,
        Value::Double(_) => 4,
        Value::Bool(_) => 5,
        Value::StringList(_) => 10,
        _ => 2,
    }
}

/// Collects the property shapes of every sub-context seen.
#[derive(Debug, Default)]
pub struct ContextShapeAggregator {
    shapes: Mutex<BTreeMap<String, BTreeMap<String, i32>>>,
}

impl ContextShapeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a context set. The first type seen for a property sticks.
    pub fn record(&self, context: &ContextSet) {
        let mut shapes = self.shapes.lock();
        for sub_context in context.iter() {
            let fields = shapes.entry(sub_context.name().to_string()).or_default();
            for (property, value) in sub_context.properties() {
                fields
                    .entry(property.clone())
                    .or_insert_with(|| shape_code(value));
            }
        }
    }

    pub fn snapshot(&self) -> Option<wire::ContextShapes> {
        Self::build(&self.shapes.lock())
    }

    pub fn clear(&self) {
        self.shapes.lock().clear();
    }

    /// Snapshot and clear in one step.
    pub fn drain(&self) -> Option<wire::ContextShapes> {
        let shapes = std::mem::take(&mut *self.shapes.lock());
        Self::build(&shapes)
    }

    fn build(shapes: &BTreeMap<String, BTreeMap<String, i32>>) -> Option<wire::ContextShapes> {
        if shapes.is_empty() {
            return None;
        }
        Some(wire::ContextShapes {
            shapes: shapes
                .iter()
                .map(|(name, fields)| wire::ContextShape {
                    name: name.clone(),
                    field_types: fields.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                })
                .collect(),
        })
    }
}

//! Example context aggregation.

use chrono::Utc;
use parking_lot::Mutex;
use prefab_core::wire;
use prefab_core::ContextSet;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct ExampleState {
    seen: HashSet<String>,
    examples: Vec<(i64, ContextSet)>,
}

/// Keeps one timestamped example per distinct grouped key.
///
/// Context sets without any `key` property have an empty grouped key and are
/// not recorded.
#[derive(Debug, Default)]
pub struct ExampleContextAggregator {
    state: Mutex<ExampleState>,
}

impl ExampleContextAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, context: &ContextSet) {
        let grouped_key = context.grouped_key();
        if grouped_key.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        if state.seen.insert(grouped_key) {
            state
                .examples
                .push((Utc::now().timestamp_millis(), context.clone()));
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Option<wire::ExampleContexts> {
        Self::build(&self.state.lock())
    }

    pub fn clear(&self) {
        *self.state.lock() = ExampleState::default();
    }

    /// Snapshot and clear in one step.
    pub fn drain(&self) -> Option<wire::ExampleContexts> {
        let state = std::mem::take(&mut *self.state.lock());
        Self::build(&state)
    }

    fn build(state: &ExampleState) -> Option<wire::ExampleContexts> {
        if state.examples.is_empty() {
            return None;
        }
        Some(wire::ExampleContexts {
            examples: state
                .examples
                .iter()
                .map(|(timestamp, context)| wire::ExampleContext {
                    timestamp: *timestamp,
                    context_set: Some(context.into()),
                })
                .collect(),
        })
    }
}

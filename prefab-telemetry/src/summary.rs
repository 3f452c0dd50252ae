//! Evaluation summary aggregation.

use chrono::Utc;
use parking_lot::Mutex;
use prefab_core::wire;
use prefab_core::{ConfigMatch, ConfigType};
use prost::Message;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SummaryKey {
    key: String,
    config_type: ConfigType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CounterKey {
    config_id: i64,
    row_index: Option<usize>,
    conditional_value_index: Option<usize>,
    weighted_value_index: Option<usize>,
    /// Protobuf encoding of the (redacted) selected value.
    selected_value: Vec<u8>,
}

#[derive(Debug, Default)]
struct SummaryState {
    start: Option<i64>,
    counters: HashMap<SummaryKey, HashMap<CounterKey, i64>>,
}

/// Counts evaluations per config and per selected branch.
#[derive(Debug, Default)]
pub struct EvaluationSummaryAggregator {
    state: Mutex<SummaryState>,
}

impl EvaluationSummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one match. Matches without a value are not counted.
    pub fn record(&self, config_match: &ConfigMatch) {
        let Some(value) = config_match.value.as_ref() else {
            return;
        };

        let summary_key = SummaryKey {
            key: config_match.key.clone(),
            config_type: config_match.config_type(),
        };
        let counter_key = CounterKey {
            config_id: config_match.config.id,
            row_index: config_match.row_index,
            conditional_value_index: config_match.conditional_value_index,
            weighted_value_index: config_match.weighted_value_index,
            selected_value: wire::ConfigValue::from(&value.redacted()).encode_to_vec(),
        };

        let mut state = self.state.lock();
        if state.start.is_none() {
            state.start = Some(Utc::now().timestamp_millis());
        }
        *state
            .counters
            .entry(summary_key)
            .or_default()
            .entry(counter_key)
            .or_insert(0) += 1;
    }

    /// Summaries recorded since the last clear; `None` when nothing was
    /// recorded.
    pub fn snapshot(&self) -> Option<wire::ConfigEvaluationSummaries> {
        Self::build(&self.state.lock())
    }

    pub fn clear(&self) {
        *self.state.lock() = SummaryState::default();
    }

    /// Snapshot and clear in one step.
    pub fn drain(&self) -> Option<wire::ConfigEvaluationSummaries> {
        let state = std::mem::take(&mut *self.state.lock());
        Self::build(&state)
    }

    fn build(state: &SummaryState) -> Option<wire::ConfigEvaluationSummaries> {
        let start = state.start?;

        let mut summaries: Vec<wire::ConfigEvaluationSummary> = state
            .counters
            .iter()
            .map(|(summary_key, counters)| {
                let mut counters: Vec<(&CounterKey, &i64)> = counters.iter().collect();
                counters.sort();
                wire::ConfigEvaluationSummary {
                    key: summary_key.key.clone(),
                    r#type: wire::ConfigType::from(summary_key.config_type) as i32,
                    counters: counters
                        .into_iter()
                        .map(|(counter, count)| wire::ConfigEvaluationCounter {
                            count: *count,
                            config_id: Some(counter.config_id),
                            selected_value: wire::ConfigValue::decode(
                                counter.selected_value.as_slice(),
                            )
                            .ok(),
                            config_row_index: counter.row_index.map(|i| i as u32),
                            conditional_value_index: counter
                                .conditional_value_index
                                .map(|i| i as u32),
                            weighted_value_index: counter.weighted_value_index.map(|i| i as u32),
                        })
                        .collect(),
                }
            })
            .collect();
        summaries.sort_by(|a, b| (&a.key, a.r#type).cmp(&(&b.key, b.r#type)));

        Some(wire::ConfigEvaluationSummaries {
            start,
            end: Utc::now().timestamp_millis(),
            summaries,
        })
    }
}

//! Rule evaluation.
//!
//! A config's rows are tried environment row first, then the fallback row.
//! Within a row the first conditional value whose criteria all hold wins.
//! Segment criteria recurse into other configs through the store.

use crate::config::{ConditionalValue, Config, ConfigRow, Criterion, Operator};
use crate::context::ContextValueGetter;
use crate::store::ConfigStore;
use crate::value::{ConfigValue, Value};
use tracing::warn;

/// Default limit on nested segment evaluation.
pub const DEFAULT_MAX_SEGMENT_DEPTH: usize = 16;

/// Outcome of evaluating one config against a context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionMatch {
    pub is_match: bool,
    /// Value of the selected conditional value; `None` on no match.
    pub value: Option<ConfigValue>,
    pub row_index: Option<usize>,
    pub conditional_value_index: Option<usize>,
    pub selected_conditional_value: Option<ConditionalValue>,
}

impl ConditionMatch {
    fn no_match() -> Self {
        Self::default()
    }

    fn selected(row_index: usize, conditional_value_index: usize, cv: &ConditionalValue) -> Self {
        Self {
            is_match: true,
            value: Some(cv.value.clone()),
            row_index: Some(row_index),
            conditional_value_index: Some(conditional_value_index),
            selected_conditional_value: Some(cv.clone()),
        }
    }
}

/// Evaluates configs against a context using a store for segment lookups.
pub struct RuleEvaluator<'a> {
    store: &'a dyn ConfigStore,
    max_depth: usize,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_SEGMENT_DEPTH,
        }
    }

    /// Limit how deep segment criteria may nest.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate a config.
    pub fn evaluate(&self, config: &Config, context: &dyn ContextValueGetter) -> ConditionMatch {
        self.evaluate_at_depth(config, context, 0)
    }

    /// Evaluate a single criterion.
    pub fn evaluate_criterion(
        &self,
        criterion: &Criterion,
        context: &dyn ContextValueGetter,
    ) -> bool {
        self.criterion_matches(criterion, context, 0)
    }

    fn evaluate_at_depth(
        &self,
        config: &Config,
        context: &dyn ContextValueGetter,
        depth: usize,
    ) -> ConditionMatch {
        let env_row = self.store.project_env_id().and_then(|env| {
            config
                .rows
                .iter()
                .find(|row| row.project_env_id == Some(env))
        });
        let fallback_row = config.rows.iter().find(|row| row.project_env_id.is_none());

        if let Some(row) = env_row
            && let Some(found) = self.evaluate_row(row, 0, context, depth)
        {
            return found;
        }

        let fallback_index = if env_row.is_some() { 1 } else { 0 };
        fallback_row
            .and_then(|row| self.evaluate_row(row, fallback_index, context, depth))
            .unwrap_or_else(ConditionMatch::no_match)
    }

    fn evaluate_row(
        &self,
        row: &ConfigRow,
        row_index: usize,
        context: &dyn ContextValueGetter,
        depth: usize,
    ) -> Option<ConditionMatch> {
        row.values.iter().enumerate().find_map(|(index, cv)| {
            cv.criteria
                .iter()
                .all(|criterion| self.criterion_matches(criterion, context, depth))
                .then(|| ConditionMatch::selected(row_index, index, cv))
        })
    }

    fn criterion_matches(
        &self,
        criterion: &Criterion,
        context: &dyn ContextValueGetter,
        depth: usize,
    ) -> bool {
        let property = || context.get_context_value(&criterion.property_name);
        let target = criterion.value_to_match.as_ref();

        match criterion.operator {
            Operator::NotSet => false,
            Operator::AlwaysTrue => true,
            Operator::PropIsOneOf => is_one_of(property(), target).unwrap_or(false),
            Operator::PropIsNotOneOf => !is_one_of(property(), target).unwrap_or(false),
            Operator::PropEndsWithOneOf => ends_with_one_of(property(), target).unwrap_or(false),
            Operator::PropDoesNotEndWithOneOf => {
                !ends_with_one_of(property(), target).unwrap_or(false)
            }
            Operator::HierarchicalMatch => {
                match (property(), target.and_then(ConfigValue::as_str)) {
                    (Some(value), Some(prefix)) => {
                        value.as_str().is_some_and(|s| s.starts_with(prefix))
                    }
                    _ => false,
                }
            }
            Operator::InIntRange => {
                let Some(range) = target.and_then(ConfigValue::as_int_range) else {
                    return false;
                };
                match property().map(|v| v.value) {
                    Some(Value::Int(n)) => range.contains_int(n),
                    Some(Value::Double(n)) => range.contains_float(n),
                    _ => false,
                }
            }
            Operator::InSeg => self.segment_result(target, context, depth) == Some(true),
            Operator::NotInSeg => self.segment_result(target, context, depth) != Some(true),
        }
    }

    /// Boolean result of a segment; `None` when the segment is missing, does
    /// not match or yields a non-boolean.
    fn segment_result(
        &self,
        target: Option<&ConfigValue>,
        context: &dyn ContextValueGetter,
        depth: usize,
    ) -> Option<bool> {
        let segment_key = target?.as_str()?;
        if depth >= self.max_depth {
            warn!(
                segment = %segment_key,
                max_depth = self.max_depth,
                "Segment nesting too deep, treating as no match"
            );
            return None;
        }
        let segment = self.store.get_config(segment_key)?;
        self.evaluate_at_depth(&segment, context, depth + 1)
            .value?
            .as_bool()
    }
}

/// Membership of a string property in a string list; `None` when either side
/// is missing or has the wrong type.
fn is_one_of(property: Option<ConfigValue>, target: Option<&ConfigValue>) -> Option<bool> {
    let property = property?;
    let value = property.as_str()?;
    let list = target?.as_string_list()?;
    Some(list.iter().any(|candidate| candidate == value))
}

fn ends_with_one_of(property: Option<ConfigValue>, target: Option<&ConfigValue>) -> Option<bool> {
    let property = property?;
    let value = property.as_str()?;
    let suffixes = target?.as_string_list()?;
    Some(suffixes.iter().any(|suffix| value.ends_with(suffix.as_str())))
}

//! Evaluation listener feeding the aggregators.

use crate::example_contexts::ExampleContextAggregator;
use crate::shapes::ContextShapeAggregator;
use crate::summary::EvaluationSummaryAggregator;
use prefab_core::wire::{self, telemetry_event::Payload};
use prefab_core::{ConfigMatch, ContextSet, EvaluationListener};

/// How much of the evaluation contexts is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextUploadMode {
    /// Nothing.
    None,
    /// Property names and types only.
    Shapes,
    /// Shapes plus one full example per distinct grouped key.
    #[default]
    PeriodicExample,
}

/// Routes resolutions into the telemetry aggregators.
#[derive(Debug)]
pub struct TelemetryRecorder {
    summaries: Option<EvaluationSummaryAggregator>,
    shapes: Option<ContextShapeAggregator>,
    examples: Option<ExampleContextAggregator>,
}

impl TelemetryRecorder {
    pub fn new(collect_evaluation_summaries: bool, context_upload_mode: ContextUploadMode) -> Self {
        let shapes = context_upload_mode != ContextUploadMode::None;
        let examples = context_upload_mode == ContextUploadMode::PeriodicExample;
        Self {
            summaries: collect_evaluation_summaries.then(EvaluationSummaryAggregator::new),
            shapes: shapes.then(ContextShapeAggregator::new),
            examples: examples.then(ExampleContextAggregator::new),
        }
    }

    /// Whether anything is being collected at all.
    pub fn is_enabled(&self) -> bool {
        self.summaries.is_some() || self.shapes.is_some() || self.examples.is_some()
    }

    pub fn summaries(&self) -> Option<&EvaluationSummaryAggregator> {
        self.summaries.as_ref()
    }

    pub fn shapes(&self) -> Option<&ContextShapeAggregator> {
        self.shapes.as_ref()
    }

    pub fn examples(&self) -> Option<&ExampleContextAggregator> {
        self.examples.as_ref()
    }

    /// Drain every aggregator into telemetry events.
    pub fn drain_events(&self) -> Vec<wire::TelemetryEvent> {
        let mut payloads = Vec::new();
        if let Some(summaries) = self.summaries.as_ref().and_then(|a| a.drain()) {
            payloads.push(Payload::Summaries(summaries));
        }
        if let Some(examples) = self.examples.as_ref().and_then(|a| a.drain()) {
            payloads.push(Payload::ExampleContexts(examples));
        }
        if let Some(shapes) = self.shapes.as_ref().and_then(|a| a.drain()) {
            payloads.push(Payload::ContextShapes(shapes));
        }
        payloads
            .into_iter()
            .map(|payload| wire::TelemetryEvent {
                payload: Some(payload),
            })
            .collect()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new(true, ContextUploadMode::default())
    }
}

impl EvaluationListener for TelemetryRecorder {
    fn on_context(&self, context: &ContextSet) {
        if let Some(shapes) = &self.shapes {
            shapes.record(context);
        }
        if let Some(examples) = &self.examples {
            examples.record(context);
        }
    }

    fn on_match(&self, config_match: &ConfigMatch) {
        if let Some(summaries) = &self.summaries {
            summaries.record(config_match);
        }
    }
}

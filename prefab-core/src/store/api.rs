//! Store hydrated from the remote config service.

use super::ConfigStore;
use crate::config::{Config, Snapshot};
use crate::context::ContextSet;
use crate::value::ConfigValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Counts from one snapshot apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub updated: usize,
    pub deleted: usize,
    pub ignored: usize,
    pub high_watermark: i64,
}

#[derive(Debug, Default)]
struct ApiState {
    configs: HashMap<String, Arc<Config>>,
    high_watermark: i64,
    project_env_id: Option<i64>,
    default_context: ContextSet,
    initialized: bool,
}

/// Live store updated by snapshots and streamed deltas.
///
/// Updates are merged by config id: a record is only replaced (or deleted by
/// a tombstone) by one with a strictly greater id, so applying any
/// interleaving of snapshots converges to the state of the highest id seen
/// per key.
#[derive(Debug, Default)]
pub struct ApiConfigStore {
    state: RwLock<ApiState>,
}

impl ApiConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a snapshot or delta into the store.
    ///
    /// The whole snapshot is applied under one write lock.
    pub fn set_from_snapshot(&self, snapshot: Snapshot) -> ApplyOutcome {
        let mut state = self.state.write();
        let mut outcome = ApplyOutcome::default();

        if !snapshot.configs.is_empty()
            && let Some(project_env_id) = snapshot.project_env_id
        {
            state.project_env_id = Some(project_env_id);
        }
        if let Some(default_context) = snapshot.default_context {
            state.default_context = default_context;
        }

        for config in snapshot.configs {
            state.high_watermark = state.high_watermark.max(config.id);
            let existing = state.configs.get(&config.key);
            let is_newer = existing.is_none_or(|current| config.id > current.id);
            let was_live = existing.is_some_and(|current| !current.is_tombstone());

            if !is_newer {
                outcome.ignored += 1;
                continue;
            }
            match (config.is_tombstone(), was_live) {
                (true, true) => outcome.deleted += 1,
                (true, false) => outcome.ignored += 1,
                (false, _) => outcome.updated += 1,
            }
            // Tombstones stay in the map so an older record arriving later
            // cannot resurrect the key.
            state.configs.insert(config.key.clone(), Arc::new(config));
        }

        state.initialized = true;
        outcome.high_watermark = state.high_watermark;

        debug!(
            updated = outcome.updated,
            deleted = outcome.deleted,
            ignored = outcome.ignored,
            high_watermark = outcome.high_watermark,
            "Applied config snapshot"
        );

        outcome
    }

    /// Highest config id seen so far.
    pub fn high_watermark(&self) -> i64 {
        self.state.read().high_watermark
    }

    /// Default context delivered with the last snapshot that carried one.
    pub fn default_context(&self) -> ContextSet {
        self.state.read().default_context.clone()
    }

    /// Number of live (non-deleted) configs.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .configs
            .values()
            .filter(|c| !c.is_tombstone())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfigStore for ApiConfigStore {
    fn get_config(&self, key: &str) -> Option<Arc<Config>> {
        self.state
            .read()
            .configs
            .get(key)
            .filter(|c| !c.is_tombstone())
            .cloned()
    }

    fn get_context_value(&self, property_name: &str) -> Option<ConfigValue> {
        self.state.read().default_context.get(property_name).cloned()
    }

    fn project_env_id(&self) -> Option<i64> {
        self.state.read().project_env_id
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .read()
            .configs
            .values()
            .filter(|c| !c.is_tombstone())
            .map(|c| c.key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }
}

//! The client surface: store assembly, lookups and background tasks.

use crate::error::{ClientError, Result};
use crate::fetcher::{HttpSnapshotFetcher, SnapshotFetcher};
use crate::gate::InitGate;
use crate::options::{ClientOptions, OnInitializationFailure, Source};
use crate::sse::ConfigStream;
use parking_lot::Mutex;
use prefab_core::{
    ApiConfigStore, ApplyOutcome, CompositeConfigStore, ConfigMatch, ConfigStore, ConfigValue,
    ContextSet, DumpConfigStore, LocalConfigStore, LogLevel, MemoryConfigStore, PrefabError,
    Resolver,
};
use prefab_telemetry::{TelemetryRecorder, TelemetrySubmitter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::{debug, info, warn};

const LOG_LEVEL_PREFIX: &str = "log-level";

/// Typed lookups shared by [`Client`] and [`ContextBoundClient`].
///
/// The raw getters return `Ok(None)` when nothing matched or the value has a
/// different type, and propagate resolution errors. The `_with_default`
/// forms never fail.
pub trait ConfigLookup {
    /// Wait for the first snapshot, applying the initialization failure
    /// policy on timeout.
    fn ensure_initialized(&self) -> Result<()>;

    /// Resolve a key without waiting on initialization.
    fn resolve_initialized(&self, key: &str, context: &ContextSet) -> Result<ConfigMatch>;

    /// Resolve a key, exposing the full match.
    fn get_config_match(&self, key: &str, context: &ContextSet) -> Result<ConfigMatch> {
        self.ensure_initialized()?;
        self.resolve_initialized(key, context)
    }

    /// The resolved value, if any.
    fn get_value(&self, key: &str, context: &ContextSet) -> Result<Option<ConfigValue>> {
        Ok(self.get_config_match(key, context)?.value)
    }

    fn get_int_value(&self, key: &str, context: &ContextSet) -> Result<Option<i64>> {
        Ok(self.get_value(key, context)?.and_then(|v| v.as_int()))
    }

    fn get_string_value(&self, key: &str, context: &ContextSet) -> Result<Option<String>> {
        Ok(self
            .get_value(key, context)?
            .and_then(|v| v.as_str().map(String::from)))
    }

    fn get_float_value(&self, key: &str, context: &ContextSet) -> Result<Option<f64>> {
        Ok(self.get_value(key, context)?.and_then(|v| v.as_float()))
    }

    fn get_bool_value(&self, key: &str, context: &ContextSet) -> Result<Option<bool>> {
        Ok(self.get_value(key, context)?.and_then(|v| v.as_bool()))
    }

    fn get_string_list_value(
        &self,
        key: &str,
        context: &ContextSet,
    ) -> Result<Option<Vec<String>>> {
        Ok(self
            .get_value(key, context)?
            .and_then(|v| v.as_string_list().map(<[String]>::to_vec)))
    }

    /// Malformed ISO-8601 durations count as a type mismatch.
    fn get_duration_value(&self, key: &str, context: &ContextSet) -> Result<Option<Duration>> {
        Ok(self.get_value(key, context)?.and_then(|v| v.as_duration()))
    }

    /// Malformed JSON counts as a type mismatch.
    fn get_json_value(
        &self,
        key: &str,
        context: &ContextSet,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self.get_value(key, context)?.and_then(|v| v.as_json()))
    }

    fn get_int_value_with_default(&self, key: &str, context: &ContextSet, default: i64) -> i64 {
        self.get_int_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_string_value_with_default(
        &self,
        key: &str,
        context: &ContextSet,
        default: &str,
    ) -> String {
        self.get_string_value(key, context)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    fn get_float_value_with_default(&self, key: &str, context: &ContextSet, default: f64) -> f64 {
        self.get_float_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool_value_with_default(&self, key: &str, context: &ContextSet, default: bool) -> bool {
        self.get_bool_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_string_list_value_with_default(
        &self,
        key: &str,
        context: &ContextSet,
        default: Vec<String>,
    ) -> Vec<String> {
        self.get_string_list_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_duration_value_with_default(
        &self,
        key: &str,
        context: &ContextSet,
        default: Duration,
    ) -> Duration {
        self.get_duration_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_json_value_with_default(
        &self,
        key: &str,
        context: &ContextSet,
        default: serde_json::Value,
    ) -> serde_json::Value {
        self.get_json_value(key, context)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    /// Whether a flag is on for the given context. Missing flags, errors
    /// and non-boolean values are off.
    fn feature_is_on_for(&self, key: &str, context: &ContextSet) -> bool {
        self.get_bool_value_with_default(key, context, false)
    }

    /// Whether a flag is on for an empty call context.
    fn feature_is_on(&self, key: &str) -> bool {
        self.feature_is_on_for(key, &ContextSet::new())
    }

    /// Most specific log level configured for a dotted logger name.
    ///
    /// Tries `log-level.a.b.c`, then `log-level.a.b`, then `log-level.a`,
    /// then `log-level`. Initialization is awaited once for the whole walk.
    fn get_log_level(&self, logger_name: &str) -> Option<LogLevel> {
        self.ensure_initialized().ok()?;
        let context = ContextSet::new();
        let mut key = if logger_name.is_empty() {
            LOG_LEVEL_PREFIX.to_string()
        } else {
            format!("{LOG_LEVEL_PREFIX}.{logger_name}")
        };

        loop {
            if let Ok(found) = self.resolve_initialized(&key, &context)
                && let Some(level) = found.value.as_ref().and_then(ConfigValue::as_log_level)
            {
                return Some(level);
            }
            match key.rfind('.') {
                Some(pos) => key.truncate(pos),
                None => return None,
            }
        }
    }
}

struct ClientInner {
    options: ClientOptions,
    resolver: Resolver,
    api_store: Option<Arc<ApiConfigStore>>,
    fetcher: Option<Arc<dyn SnapshotFetcher>>,
    gate: Arc<InitGate>,
    recorder: Option<Arc<TelemetryRecorder>>,
    background: Mutex<Option<Runtime>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.background.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// Feature flag and dynamic config client.
///
/// Cheap to clone; clones share stores and background tasks.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("initialized", &self.inner.gate.is_open())
            .field("started", &self.inner.background.lock().is_some())
            .finish()
    }
}

impl Client {
    /// Build a client and load every local source. Nothing is fetched until
    /// [`start`](Self::start) or [`refresh`](Self::refresh).
    pub fn new(options: ClientOptions) -> Result<Self> {
        let fetcher = match options.resolved_api_key() {
            Some(api_key) if options.uses_api() => Some(Arc::new(HttpSnapshotFetcher::new(
                options.resolved_api_urls(),
                api_key,
                options.retry.clone(),
            )?) as Arc<dyn SnapshotFetcher>),
            _ => None,
        };
        Self::build(options, fetcher)
    }

    /// Build a client whose snapshots come from a custom fetcher.
    pub fn with_fetcher(options: ClientOptions, fetcher: Arc<dyn SnapshotFetcher>) -> Result<Self> {
        Self::build(options, Some(fetcher))
    }

    fn build(options: ClientOptions, fetcher: Option<Arc<dyn SnapshotFetcher>>) -> Result<Self> {
        options.validate()?;

        let mut stores: Vec<Arc<dyn ConfigStore>> = Vec::new();
        if let Some(dir) = options.resolved_override_directory() {
            load_local_files(&options, &dir, &mut stores)?;
        }

        let mut api_store = None;
        for source in options.resolved_sources() {
            match source {
                Source::Api => {
                    let store = api_store
                        .get_or_insert_with(|| Arc::new(ApiConfigStore::new()))
                        .clone();
                    stores.push(store);
                }
                Source::LocalFiles => {
                    load_local_files(&options, &options.config_directory, &mut stores)?;
                }
                Source::Datafile {
                    path,
                    project_env_id,
                } => {
                    let store = DumpConfigStore::load(&path, project_env_id)?;
                    info!(path = %path.display(), configs = store.len(), "Loaded config dump");
                    stores.push(Arc::new(store));
                }
                Source::Memory(values) => {
                    stores.push(Arc::new(MemoryConfigStore::new(values)));
                }
            }
        }

        let gate = if api_store.is_some() {
            InitGate::new()
        } else {
            InitGate::opened()
        };

        let recorder = options
            .uses_api()
            .then(|| {
                TelemetryRecorder::new(
                    options.collect_evaluation_summaries,
                    options.context_upload_mode,
                )
            })
            .filter(TelemetryRecorder::is_enabled)
            .map(Arc::new);

        let mut resolver = Resolver::new(Arc::new(CompositeConfigStore::new(stores)))
            .with_env(options.env.clone())
            .with_max_depth(options.max_segment_depth);
        if let Some(recorder) = &recorder {
            resolver = resolver.with_listener(recorder.clone());
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                resolver,
                api_store,
                fetcher,
                gate: Arc::new(gate),
                recorder,
                background: Mutex::new(None),
            }),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// The live store fed by the config service, when the API is a source.
    pub fn api_store(&self) -> Option<&Arc<ApiConfigStore>> {
        self.inner.api_store.as_ref()
    }

    /// The telemetry recorder, when telemetry is collected.
    pub fn telemetry(&self) -> Option<&Arc<TelemetryRecorder>> {
        self.inner.recorder.as_ref()
    }

    /// Whether the first snapshot has been applied (always true without an
    /// API source).
    pub fn is_initialized(&self) -> bool {
        self.inner.gate.is_open()
    }

    /// Every key that any store can resolve.
    pub fn keys(&self) -> Vec<String> {
        self.inner.resolver.store().keys()
    }

    /// Handle whose lookups layer `context` under each call context.
    pub fn with_context(&self, context: ContextSet) -> ContextBoundClient {
        ContextBoundClient {
            client: self.clone(),
            context,
        }
    }

    /// Fetch once from the current watermark and apply the result.
    pub async fn refresh(&self) -> Result<ApplyOutcome> {
        let (Some(store), Some(fetcher)) = (&self.inner.api_store, &self.inner.fetcher) else {
            return Err(ClientError::InvalidOptions(
                "client has no API source".to_string(),
            ));
        };
        apply_fetch(store, fetcher.as_ref(), &self.inner.gate).await
    }

    /// Start the fetch-then-stream task and the telemetry task on a
    /// background runtime owned by the client. Calling it again is a no-op.
    ///
    /// Works with or without an ambient tokio runtime; lookups that block on
    /// initialization never starve these tasks.
    pub fn start(&self) -> Result<()> {
        let mut background = self.inner.background.lock();
        if background.is_some() {
            return Ok(());
        }

        let options = &self.inner.options;
        let api_key = options.resolved_api_key();

        let updates = match (&self.inner.api_store, &self.inner.fetcher) {
            (Some(store), Some(fetcher)) => {
                let stream = match (&api_key, options.enable_streaming) {
                    (Some(api_key), true) => Some(ConfigStream::new(
                        options.resolved_api_urls(),
                        api_key.clone(),
                        store.clone(),
                        self.inner.gate.clone(),
                        options.stream_reconnect_delay,
                    )?),
                    _ => None,
                };
                Some((store.clone(), fetcher.clone(), stream))
            }
            _ => None,
        };
        let submitter = match (&self.inner.recorder, api_key) {
            (Some(recorder), Some(api_key)) => Some(Arc::new(
                TelemetrySubmitter::new(&options.telemetry_host, api_key, recorder.clone())?
                    .with_interval(options.telemetry_sync_interval),
            )),
            _ => None,
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("prefab-client")
            .enable_all()
            .build()?;

        if let Some((store, fetcher, stream)) = updates {
            let gate = self.inner.gate.clone();
            runtime.spawn(async move {
                if let Err(e) = apply_fetch(&store, fetcher.as_ref(), &gate).await {
                    warn!(error = %e, "Initial config fetch failed, continuing with streaming");
                }
                if let Some(stream) = stream {
                    stream.run().await;
                }
            });
        }
        let telemetry = submitter.is_some();
        if let Some(submitter) = submitter {
            runtime.spawn(submitter.run());
        }

        *background = Some(runtime);
        debug!(telemetry, "Client started");
        Ok(())
    }

    /// Stop every background task.
    pub fn stop(&self) {
        if let Some(runtime) = self.inner.background.lock().take() {
            runtime.shutdown_background();
            debug!("Client stopped");
        }
    }

    /// Wait without blocking the current task until the first snapshot has
    /// been applied, applying the initialization failure policy on timeout.
    ///
    /// Once this returns `Ok`, lookups no longer wait.
    pub async fn initialized(&self) -> Result<()> {
        let timeout = self.inner.options.initialization_timeout;
        let opened = tokio::time::timeout(timeout, self.inner.gate.wait_open())
            .await
            .is_ok();
        self.initialization_outcome(opened)
    }

    fn await_initialization(&self) -> Result<()> {
        let gate = &self.inner.gate;
        if gate.is_open() {
            return Ok(());
        }

        let timeout = self.inner.options.initialization_timeout;
        let opened = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| gate.wait(timeout))
            }
            _ => gate.wait(timeout),
        };
        self.initialization_outcome(opened)
    }

    fn initialization_outcome(&self, opened: bool) -> Result<()> {
        if opened {
            return Ok(());
        }

        let timeout = self.inner.options.initialization_timeout;
        match self.inner.options.on_initialization_failure {
            OnInitializationFailure::ReturnError => {
                Err(PrefabError::InitializationTimeout(timeout).into())
            }
            OnInitializationFailure::Unlock => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Config service did not initialize in time, unlocking lookups"
                );
                self.inner.gate.open();
                Ok(())
            }
        }
    }
}

impl ConfigLookup for Client {
    fn ensure_initialized(&self) -> Result<()> {
        self.await_initialization()
    }

    fn resolve_initialized(&self, key: &str, context: &ContextSet) -> Result<ConfigMatch> {
        let merged = ContextSet::merge([&self.inner.options.global_context, context]);
        Ok(self.inner.resolver.resolve(key, &merged)?)
    }
}

/// A [`Client`] carrying a context that applies to every lookup.
#[derive(Debug, Clone)]
pub struct ContextBoundClient {
    client: Client,
    context: ContextSet,
}

impl ContextBoundClient {
    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Further narrow the bound context; `context` wins per sub-context.
    pub fn with_context(&self, context: ContextSet) -> ContextBoundClient {
        ContextBoundClient {
            client: self.client.clone(),
            context: ContextSet::merge([&self.context, &context]),
        }
    }
}

impl ConfigLookup for ContextBoundClient {
    fn ensure_initialized(&self) -> Result<()> {
        self.client.ensure_initialized()
    }

    fn resolve_initialized(&self, key: &str, context: &ContextSet) -> Result<ConfigMatch> {
        let merged = ContextSet::merge([&self.context, context]);
        self.client.resolve_initialized(key, &merged)
    }
}

async fn apply_fetch(
    store: &ApiConfigStore,
    fetcher: &dyn SnapshotFetcher,
    gate: &InitGate,
) -> Result<ApplyOutcome> {
    let snapshot = fetcher.fetch(store.high_watermark()).await?;
    let outcome = store.set_from_snapshot(snapshot);
    info!(
        updated = outcome.updated,
        deleted = outcome.deleted,
        high_watermark = outcome.high_watermark,
        "Applied config snapshot"
    );
    gate.open();
    Ok(outcome)
}

fn load_local_files(
    options: &ClientOptions,
    dir: &Path,
    stores: &mut Vec<Arc<dyn ConfigStore>>,
) -> Result<()> {
    for path in options.local_files_in(dir) {
        if !path.is_file() {
            continue;
        }
        stores.push(Arc::new(LocalConfigStore::load(&path)?));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefab_core::{Context, MapEnv};
    use std::collections::HashMap;

    fn memory_client(values: &[(&str, ConfigValue)]) -> Client {
        let values: HashMap<String, ConfigValue> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Client::new(
            ClientOptions::builder()
                .source(Source::Memory(values))
                .env(Arc::new(MapEnv::new()))
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_typed_getters() {
        let client = memory_client(&[
            ("limit", ConfigValue::int(25)),
            ("ratio", ConfigValue::double(0.5)),
            ("name", ConfigValue::string("prefab")),
            ("tags", ConfigValue::string_list(["a", "b"])),
            ("timeout", ConfigValue::duration("PT1.5S")),
            ("payload", ConfigValue::json(r#"{"a": 1}"#)),
        ]);
        let ctx = ContextSet::new();

        assert_eq!(client.get_int_value("limit", &ctx).unwrap(), Some(25));
        assert_eq!(client.get_float_value("ratio", &ctx).unwrap(), Some(0.5));
        assert_eq!(
            client.get_string_value("name", &ctx).unwrap().as_deref(),
            Some("prefab")
        );
        assert_eq!(
            client.get_string_list_value("tags", &ctx).unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            client.get_duration_value("timeout", &ctx).unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            client.get_json_value("payload", &ctx).unwrap(),
            Some(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn test_type_mismatch_is_none_not_error() {
        let client = memory_client(&[("limit", ConfigValue::int(25))]);
        let ctx = ContextSet::new();

        assert_eq!(client.get_string_value("limit", &ctx).unwrap(), None);
        assert_eq!(
            client.get_string_value_with_default("limit", &ctx, "fallback"),
            "fallback"
        );
    }

    #[test]
    fn test_missing_key() {
        let client = memory_client(&[]);
        let ctx = ContextSet::new();

        let err = client.get_int_value("missing", &ctx).unwrap_err();
        assert!(err.as_prefab().is_some_and(|e| e.is_missing()));
        assert_eq!(client.get_int_value_with_default("missing", &ctx, 7), 7);
        assert!(!client.feature_is_on("missing"));
    }

    #[test]
    fn test_feature_flags() {
        let client = memory_client(&[
            ("on", ConfigValue::bool(true)),
            ("off", ConfigValue::bool(false)),
            ("not-a-flag", ConfigValue::string("true")),
        ]);

        assert!(client.feature_is_on("on"));
        assert!(!client.feature_is_on("off"));
        assert!(!client.feature_is_on("not-a-flag"));
    }

    #[test]
    fn test_log_level_walks_up() {
        let client = memory_client(&[
            ("log-level", ConfigValue::log_level(LogLevel::Warn)),
            ("log-level.app.db", ConfigValue::log_level(LogLevel::Debug)),
        ]);

        assert_eq!(client.get_log_level("app.db.pool"), Some(LogLevel::Debug));
        assert_eq!(client.get_log_level("app.http"), Some(LogLevel::Warn));
        assert_eq!(client.get_log_level(""), Some(LogLevel::Warn));

        let empty = memory_client(&[]);
        assert_eq!(empty.get_log_level("app"), None);
    }

    #[test]
    fn test_keys_and_initialized() {
        let client = memory_client(&[("a", ConfigValue::int(1)), ("b", ConfigValue::int(2))]);
        assert!(client.is_initialized());
        assert!(client.api_store().is_none());
        assert!(client.telemetry().is_none());
        assert_eq!(client.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_bound_context_layers() {
        let client = memory_client(&[("a", ConfigValue::int(1))]);
        let bound = client
            .with_context(ContextSet::new().with_context(Context::new("user").with("key", "u1")))
            .with_context(ContextSet::new().with_context(Context::new("team").with("key", "t1")));

        assert_eq!(bound.context().len(), 2);
        assert_eq!(bound.get_int_value("a", &ContextSet::new()).unwrap(), Some(1));
    }

    #[test]
    fn test_start_outside_a_runtime() {
        let client = memory_client(&[]);
        client.start().unwrap();
        client.start().unwrap();
        assert!(format!("{client:?}").contains("started: true"));

        client.stop();
        assert!(format!("{client:?}").contains("started: false"));
    }
}

//! Client configuration.

use crate::error::{ClientError, Result};
use crate::retry::RetryConfig;
use prefab_core::{ConfigValue, ContextSet, DEFAULT_MAX_SEGMENT_DEPTH, EnvLookup, ProcessEnv};
use prefab_telemetry::{ContextUploadMode, DEFAULT_SYNC_INTERVAL, DEFAULT_TELEMETRY_HOST};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default config service URL.
pub const DEFAULT_API_URL: &str = "https://api.prefab.cloud";

/// Environment variable holding the API key.
pub const API_KEY_ENV_VAR: &str = "PREFAB_API_KEY";

/// Environment variable holding a comma separated list of API URLs.
pub const API_URL_ENV_VAR: &str = "PREFAB_API_URL";

/// Name of the local file read for every environment.
pub const DEFAULT_CONFIG_FILE: &str = ".prefab.default.config.yaml";

/// Name of the local file for one environment.
pub fn environment_config_file(environment: &str) -> String {
    format!(".prefab.{environment}.config.yaml")
}

/// Where configs come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// The remote config service (initial fetch, then streaming).
    Api,
    /// YAML files in the config directory.
    LocalFiles,
    /// A binary config dump bound to one environment.
    Datafile {
        path: PathBuf,
        project_env_id: i64,
    },
    /// Fixed values.
    Memory(HashMap<String, ConfigValue>),
}

/// What lookups do when the first snapshot does not arrive in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnInitializationFailure {
    /// Fail the lookup with an initialization timeout.
    #[default]
    ReturnError,
    /// Carry on with whatever the stores hold.
    Unlock,
}

/// Client options.
#[derive(Clone)]
pub struct ClientOptions {
    /// API key; falls back to `PREFAB_API_KEY`.
    pub api_key: Option<String>,
    /// Config service URLs tried in order; falls back to `PREFAB_API_URL`.
    pub api_urls: Vec<String>,
    pub telemetry_host: String,
    /// Explicit sources; `None` picks a default from the API key.
    pub sources: Option<Vec<Source>>,
    pub initialization_timeout: Duration,
    pub on_initialization_failure: OnInitializationFailure,
    /// Context merged under every lookup's context.
    pub global_context: ContextSet,
    pub config_directory: PathBuf,
    /// Directory whose files override every source; defaults to `$HOME`.
    pub config_override_directory: Option<PathBuf>,
    pub environment_names: Vec<String>,
    pub retry: RetryConfig,
    pub stream_reconnect_delay: Duration,
    pub enable_streaming: bool,
    pub collect_evaluation_summaries: bool,
    pub context_upload_mode: ContextUploadMode,
    pub telemetry_sync_interval: Duration,
    pub max_segment_depth: usize,
    /// Environment used for fallbacks and provided values.
    pub env: Arc<dyn EnvLookup>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_key: None,
            api_urls: Vec::new(),
            telemetry_host: DEFAULT_TELEMETRY_HOST.to_string(),
            sources: None,
            initialization_timeout: Duration::from_secs(10),
            on_initialization_failure: OnInitializationFailure::default(),
            global_context: ContextSet::new(),
            config_directory: PathBuf::from("."),
            config_override_directory: None,
            environment_names: Vec::new(),
            retry: RetryConfig::default(),
            stream_reconnect_delay: Duration::from_secs(1),
            enable_streaming: true,
            collect_evaluation_summaries: true,
            context_upload_mode: ContextUploadMode::default(),
            telemetry_sync_interval: DEFAULT_SYNC_INTERVAL,
            max_segment_depth: DEFAULT_MAX_SEGMENT_DEPTH,
            env: Arc::new(ProcessEnv),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_urls", &self.api_urls)
            .field("telemetry_host", &self.telemetry_host)
            .field("sources", &self.sources)
            .field("initialization_timeout", &self.initialization_timeout)
            .field("on_initialization_failure", &self.on_initialization_failure)
            .field("global_context", &self.global_context)
            .field("config_directory", &self.config_directory)
            .field("config_override_directory", &self.config_override_directory)
            .field("environment_names", &self.environment_names)
            .field("retry", &self.retry)
            .field("stream_reconnect_delay", &self.stream_reconnect_delay)
            .field("enable_streaming", &self.enable_streaming)
            .field(
                "collect_evaluation_summaries",
                &self.collect_evaluation_summaries,
            )
            .field("context_upload_mode", &self.context_upload_mode)
            .field("telemetry_sync_interval", &self.telemetry_sync_interval)
            .field("max_segment_depth", &self.max_segment_depth)
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    /// Create a new options builder.
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// The explicit API key, else `PREFAB_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| self.env.lookup(API_KEY_ENV_VAR))
            .filter(|key| !key.is_empty())
    }

    /// The explicit URLs, else `PREFAB_API_URL`, else the default service.
    pub fn resolved_api_urls(&self) -> Vec<String> {
        if !self.api_urls.is_empty() {
            return self.api_urls.clone();
        }
        if let Some(list) = self.env.lookup(API_URL_ENV_VAR) {
            let urls: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
            if !urls.is_empty() {
                return urls;
            }
        }
        vec![DEFAULT_API_URL.to_string()]
    }

    /// The explicit sources, else `[Api, LocalFiles]` when an API key is
    /// known and `[LocalFiles]` otherwise.
    pub fn resolved_sources(&self) -> Vec<Source> {
        match &self.sources {
            Some(sources) => sources.clone(),
            None if self.resolved_api_key().is_some() => vec![Source::Api, Source::LocalFiles],
            None => vec![Source::LocalFiles],
        }
    }

    pub fn resolved_override_directory(&self) -> Option<PathBuf> {
        self.config_override_directory
            .clone()
            .or_else(|| self.env.lookup("HOME").map(PathBuf::from))
    }

    /// Local files in `dir`, environment-specific ones first.
    pub fn local_files_in(&self, dir: &Path) -> Vec<PathBuf> {
        self.environment_names
            .iter()
            .map(|environment| dir.join(environment_config_file(environment)))
            .chain(std::iter::once(dir.join(DEFAULT_CONFIG_FILE)))
            .collect()
    }

    /// Whether the remote service is one of the sources.
    pub fn uses_api(&self) -> bool {
        self.resolved_sources()
            .iter()
            .any(|source| matches!(source, Source::Api))
    }

    /// Reject option combinations the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.uses_api() {
            if self.resolved_api_key().is_none() {
                return Err(ClientError::InvalidOptions(
                    "API source requires an API key".to_string(),
                ));
            }
            if self.resolved_api_urls().is_empty() {
                return Err(ClientError::InvalidOptions(
                    "API source requires at least one URL".to_string(),
                ));
            }
        }
        if self.telemetry_sync_interval.is_zero() {
            return Err(ClientError::InvalidOptions(
                "telemetry sync interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for client options.
#[derive(Debug, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.options.api_key = Some(api_key.into());
        self
    }

    /// Add a config service URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.options.api_urls.push(url.into());
        self
    }

    pub fn telemetry_host(mut self, host: impl Into<String>) -> Self {
        self.options.telemetry_host = host.into();
        self
    }

    /// Add a source; the first call replaces the default sources.
    pub fn source(mut self, source: Source) -> Self {
        self.options.sources.get_or_insert_with(Vec::new).push(source);
        self
    }

    pub fn sources(mut self, sources: Vec<Source>) -> Self {
        self.options.sources = Some(sources);
        self
    }

    pub fn initialization_timeout(mut self, timeout: Duration) -> Self {
        self.options.initialization_timeout = timeout;
        self
    }

    pub fn on_initialization_failure(mut self, policy: OnInitializationFailure) -> Self {
        self.options.on_initialization_failure = policy;
        self
    }

    pub fn global_context(mut self, context: ContextSet) -> Self {
        self.options.global_context = context;
        self
    }

    pub fn config_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.config_directory = dir.into();
        self
    }

    pub fn config_override_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.config_override_directory = Some(dir.into());
        self
    }

    /// Add an environment whose local file is read.
    pub fn environment_name(mut self, name: impl Into<String>) -> Self {
        self.options.environment_names.push(name.into());
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.options.retry = retry;
        self
    }

    pub fn stream_reconnect_delay(mut self, delay: Duration) -> Self {
        self.options.stream_reconnect_delay = delay;
        self
    }

    pub fn enable_streaming(mut self, enable: bool) -> Self {
        self.options.enable_streaming = enable;
        self
    }

    pub fn collect_evaluation_summaries(mut self, enable: bool) -> Self {
        self.options.collect_evaluation_summaries = enable;
        self
    }

    pub fn context_upload_mode(mut self, mode: ContextUploadMode) -> Self {
        self.options.context_upload_mode = mode;
        self
    }

    pub fn telemetry_sync_interval(mut self, interval: Duration) -> Self {
        self.options.telemetry_sync_interval = interval;
        self
    }

    pub fn max_segment_depth(mut self, depth: usize) -> Self {
        self.options.max_segment_depth = depth;
        self
    }

    /// Environment used for fallbacks and provided values.
    pub fn env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.options.env = env;
        self
    }

    /// Build the options.
    pub fn build(self) -> ClientOptions {
        self.options
    }
}

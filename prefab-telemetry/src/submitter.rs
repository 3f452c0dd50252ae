//! Periodic telemetry upload.

use crate::error::{Result, TelemetryError};
use crate::recorder::TelemetryRecorder;
use prefab_core::wire;
use prost::Message;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default telemetry endpoint.
pub const DEFAULT_TELEMETRY_HOST: &str = "https://telemetry.prefab.cloud";

/// Default interval between uploads.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

const TELEMETRY_PATH: &str = "/api/v1/telemetry";
const CLIENT_VERSION_HEADER: &str = "X-PrefabCloud-Client-Version";

/// Drains a [`TelemetryRecorder`] and posts the events to the telemetry host.
#[derive(Debug)]
pub struct TelemetrySubmitter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    instance_hash: String,
    recorder: Arc<TelemetryRecorder>,
    interval: Duration,
}

impl TelemetrySubmitter {
    pub fn new(
        telemetry_host: impl AsRef<str>,
        api_key: impl Into<String>,
        recorder: Arc<TelemetryRecorder>,
    ) -> Result<Self> {
        let host = telemetry_host.as_ref().trim_end_matches('/');
        if host.is_empty() {
            return Err(TelemetryError::Configuration(
                "telemetry host must not be empty".to_string(),
            ));
        }

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: format!("{host}{TELEMETRY_PATH}"),
            api_key: api_key.into(),
            instance_hash: uuid::Uuid::new_v4().to_string(),
            recorder,
            interval: DEFAULT_SYNC_INTERVAL,
        })
    }

    /// Set the upload interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn instance_hash(&self) -> &str {
        &self.instance_hash
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drain the recorder and post whatever it held.
    ///
    /// Returns `Ok(false)` without touching the network when there was
    /// nothing to send. Drained events are not re-queued on failure.
    pub async fn submit_once(&self) -> Result<bool> {
        let events = self.recorder.drain_events();
        if events.is_empty() {
            return Ok(false);
        }

        let count = events.len();
        let body = wire::TelemetryEvents {
            instance_hash: self.instance_hash.clone(),
            events,
        }
        .encode_to_vec();

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth("1", Some(&self.api_key))
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header(
                CLIENT_VERSION_HEADER,
                format!("prefab-rust-{}", prefab_core::VERSION),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status {
                status: status.as_u16(),
            });
        }

        debug!(events = count, "telemetry submitted");
        Ok(true)
    }

    /// Spawn the upload loop on the current runtime.
    ///
    /// Failures are logged and the loop keeps going; abort the returned
    /// handle to stop it.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Submit on every interval tick until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        // first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.submit_once().await {
                warn!(error = %e, endpoint = %self.endpoint, "telemetry submission failed");
            }
        }
    }
}

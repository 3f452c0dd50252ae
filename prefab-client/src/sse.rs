//! Streaming config updates over server-sent events.

use crate::error::{ClientError, Result};
use crate::fetcher::{CLIENT_VERSION_HEADER, client_version};
use crate::gate::InitGate;
use base64::Engine;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use prefab_core::{ApiConfigStore, ApplyOutcome, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the highest config id already held.
pub const START_AT_ID_HEADER: &str = "x-prefab-start-at-id";

/// Decode one event's data into the store.
///
/// Empty data is ignored and yields `Ok(None)`.
pub fn apply_event(store: &ApiConfigStore, data: &str) -> Result<Option<ApplyOutcome>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(data)?;
    let snapshot = Snapshot::decode(&bytes)?;
    Ok(Some(store.set_from_snapshot(snapshot)))
}

/// Long-lived reader of `{base}/api/v1/sse/config`.
///
/// Each connection resumes from the store's high watermark; on any error
/// or disconnect it waits `reconnect_delay` and tries the next URL.
#[derive(Debug, Clone)]
pub struct ConfigStream {
    http: reqwest::Client,
    api_urls: Vec<String>,
    api_key: String,
    store: Arc<ApiConfigStore>,
    gate: Arc<InitGate>,
    reconnect_delay: Duration,
}

impl ConfigStream {
    pub fn new(
        api_urls: Vec<String>,
        api_key: impl Into<String>,
        store: Arc<ApiConfigStore>,
        gate: Arc<InitGate>,
        reconnect_delay: Duration,
    ) -> Result<Self> {
        if api_urls.is_empty() {
            return Err(ClientError::InvalidOptions(
                "at least one API URL is required".to_string(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_urls: api_urls
                .into_iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
            api_key: api_key.into(),
            store,
            gate,
            reconnect_delay,
        })
    }

    /// Read until the task is aborted.
    pub async fn run(self) {
        for base in self.api_urls.iter().cycle() {
            match self.consume(base).await {
                Ok(()) => info!(url = %base, "Config stream closed by server"),
                Err(e) => warn!(url = %base, error = %e, "Config stream failed"),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection: read events until the server closes the stream.
    pub async fn consume(&self, base: &str) -> Result<()> {
        let start_at = self.store.high_watermark();
        let response = self
            .http
            .get(format!("{base}/api/v1/sse/config"))
            .basic_auth("1", Some(&self.api_key))
            .header(START_AT_ID_HEADER, start_at.to_string())
            .header(CLIENT_VERSION_HEADER, client_version())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }
        debug!(url = %base, start_at, "Config stream connected");

        apply_events(&self.store, &self.gate, response.bytes_stream().eventsource()).await
    }
}

/// Apply every event of a decoded stream until it ends. The gate opens on
/// the first applied event; malformed events are logged and skipped.
pub(crate) async fn apply_events<S, E>(store: &ApiConfigStore, gate: &InitGate, events: S) -> Result<()>
where
    S: Stream<Item = std::result::Result<Event, EventStreamError<E>>>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| ClientError::Stream(e.to_string()))?;
        match apply_event(store, &event.data) {
            Ok(Some(outcome)) => {
                debug!(
                    updated = outcome.updated,
                    deleted = outcome.deleted,
                    high_watermark = outcome.high_watermark,
                    "Applied streamed configs"
                );
                gate.open();
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Dropping malformed config event"),
        }
    }

    Ok(())
}

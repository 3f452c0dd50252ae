//! Snapshot download from the config service.

use crate::error::{ClientError, Result};
use crate::retry::RetryConfig;
use async_trait::async_trait;
use prefab_core::Snapshot;
use std::time::Instant;
use tracing::{debug, warn};

pub(crate) const CLIENT_VERSION_HEADER: &str = "X-PrefabCloud-Client-Version";

pub(crate) fn client_version() -> String {
    format!("prefab-rust-{}", prefab_core::VERSION)
}

/// Source of config snapshots.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch every config newer than `offset`.
    async fn fetch(&self, offset: i64) -> Result<Snapshot>;
}

/// Fetches `{base}/api/v1/configs/{offset}` from each configured URL in
/// turn, retrying each per the [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct HttpSnapshotFetcher {
    http: reqwest::Client,
    api_urls: Vec<String>,
    api_key: String,
    retry: RetryConfig,
}

impl HttpSnapshotFetcher {
    pub fn new(api_urls: Vec<String>, api_key: impl Into<String>, retry: RetryConfig) -> Result<Self> {
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
            retry,
        })
    }

    pub fn api_urls(&self) -> &[String] {
        &self.api_urls
    }

    async fn fetch_once(&self, base: &str, offset: i64) -> Result<Snapshot> {
        let response = self
            .http
            .get(format!("{base}/api/v1/configs/{offset}"))
            .basic_auth("1", Some(&self.api_key))
            .header(CLIENT_VERSION_HEADER, client_version())
            .header(reqwest::header::ACCEPT, "application/x-protobuf")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(Snapshot::decode(&body)?)
    }

    async fn fetch_with_retry(&self, base: &str, offset: i64, attempts: &mut u32) -> Result<Snapshot> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            *attempts += 1;
            let error = match self.fetch_once(base, offset).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => e,
            };

            let out_of_time = self
                .retry
                .max_retry_time
                .is_some_and(|max| start.elapsed() > max);
            if out_of_time || !self.retry.should_retry(attempt, &error) {
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry.delay_for_attempt(attempt);
            debug!(
                url = %base,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying config fetch"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, offset: i64) -> Result<Snapshot> {
        let mut attempts = 0;
        let mut last_error = None;

        for base in &self.api_urls {
            match self.fetch_with_retry(base, offset, &mut attempts).await {
                Ok(snapshot) => {
                    debug!(url = %base, offset, configs = snapshot.configs.len(), "Fetched configs");
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!(url = %base, error = %e, "Config fetch failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ClientError::RetryExhausted {
            attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no API URL configured".to_string()),
        })
    }
}

//! Telemetry backend access.
//!
//! [`TelemetrySource`] is the seam between the poll loop and the network.
//! [`HttpSource`] implements it over the backend's read-only JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::{Config, EndpointLayout};
use crate::error::{Error, Result};
use crate::state::HistoryLimit;
use crate::telemetry::{HealthStatus, LatestResponse, ListResponse, Snapshot, TelemetryRecord};

/// A source of telemetry snapshots and backend health.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the latest record plus a history window of at most `limit` records.
    ///
    /// # Errors
    ///
    /// Returns a transport or decode error; callers keep their previous data.
    async fn fetch_snapshot(&self, limit: HistoryLimit) -> Result<Snapshot>;

    /// Probe backend health.
    ///
    /// Fail-closed: any failure reads as disconnected.
    async fn fetch_health(&self) -> bool;

    /// Fetch the records the backend classified as anomalous.
    ///
    /// # Errors
    ///
    /// Returns a transport or decode error.
    async fn fetch_anomalies(&self) -> Result<Vec<TelemetryRecord>>;
}

/// [`TelemetrySource`] backed by the backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    layout: EndpointLayout,
}

impl HttpSource {
    /// Create a source for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, layout: EndpointLayout, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            layout,
        })
    }

    /// Create a source from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url(), config.api.layout, config.request_timeout())
    }

    /// The base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and decode the health body for the configured layout.
    ///
    /// The `latest` layout probes `/status`; the `list` layout probes
    /// `/health`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HealthCheck`] on any transport or decode failure.
    pub async fn health_status(&self) -> Result<HealthStatus> {
        self.get_json::<HealthStatus>(self.layout.health_path(), &[])
            .await
            .map_err(|e| Error::health_check(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        trace!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_reqwest(url.as_str(), e))?;
        serde_json::from_slice(&body).map_err(|e| Error::decode(url, e.to_string()))
    }
}

#[async_trait]
impl TelemetrySource for HttpSource {
    async fn fetch_snapshot(&self, limit: HistoryLimit) -> Result<Snapshot> {
        let snapshot = match self.layout {
            EndpointLayout::Latest => {
                let response: LatestResponse = self
                    .get_json(
                        "/telemetry/latest",
                        &[("history_limit", limit.to_string())],
                    )
                    .await?;
                Snapshot::from_latest(response, limit.as_usize())
            }
            EndpointLayout::List => {
                let response: ListResponse = self
                    .get_json("/telemetry", &[("limit", limit.to_string())])
                    .await?;
                Snapshot::from_newest_first(response.into_records(), limit.as_usize())
            }
        };
        debug!(
            history = snapshot.history.len(),
            anomalies = snapshot.anomaly_count(),
            "snapshot fetched"
        );
        Ok(snapshot)
    }

    async fn fetch_health(&self) -> bool {
        match self.health_status().await {
            Ok(status) => status.connected,
            Err(e) => {
                debug!(error = %e, "treating backend as disconnected");
                false
            }
        }
    }

    async fn fetch_anomalies(&self) -> Result<Vec<TelemetryRecord>> {
        self.get_json("/telemetry/anomalies", &[]).await
    }
}

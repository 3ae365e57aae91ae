use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::SourceError;
use crate::models::{
    LeaderboardMetric, MerchantLeaderboardRow, MilestoneEvent, ProductLeaderboardRow, SaleEntry,
    SceneRecord, Summary, WifiConfig,
};

use super::EventSource;

const MAX_ERROR_BODY_CHARS: usize = 200;
const WIFI_SOURCE: &str = "wifi";

#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Backend origin, e.g. `http://localhost:8080`.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSourceConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`EventSource`] backed by the venue backend's `/v1` REST API.
pub struct HttpEventSource {
    client: Client,
    base_url: String,
}

impl HttpEventSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SourceError::Config("API base URL not configured".into()));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, base_url })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SourceError::Timeout(path.to_string())
                } else {
                    SourceError::Http(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("GET {} -> {} ({} bytes)", path, status, bytes.len());
        serde_json::from_slice(&bytes).map_err(|source| SourceError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_summary(&self) -> Result<Summary, SourceError> {
        self.get_json("/v1/summary", &[]).await
    }

    async fn fetch_recent_events(&self, limit: usize) -> Result<Vec<SaleEntry>, SourceError> {
        self.get_json("/v1/ticker", &[("limit", limit.to_string())])
            .await
    }

    async fn fetch_milestone_triggers(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MilestoneEvent>, SourceError> {
        // The backend answers `null` rather than `[]` when nothing fired.
        let triggers: Option<Vec<MilestoneEvent>> = self
            .get_json(
                "/v1/milestones/triggers",
                &[("since", since.to_rfc3339_opts(SecondsFormat::Nanos, true))],
            )
            .await?;
        Ok(triggers.unwrap_or_default())
    }

    async fn fetch_scene_configuration(&self) -> Result<Vec<SceneRecord>, SourceError> {
        self.get_json("/v1/scenes", &[]).await
    }

    async fn fetch_merchant_leaderboard(
        &self,
        metric: LeaderboardMetric,
        window: &str,
        limit: usize,
    ) -> Result<Vec<MerchantLeaderboardRow>, SourceError> {
        let mut query = vec![
            ("metric", metric.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if !window.is_empty() {
            query.push(("window", window.to_string()));
        }
        self.get_json("/v1/leaderboard/merchants", &query).await
    }

    async fn fetch_product_leaderboard(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<ProductLeaderboardRow>, SourceError> {
        self.get_json(
            "/v1/leaderboard/products",
            &[("metric", metric.as_str().to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn fetch_wifi_summary(&self) -> Result<Summary, SourceError> {
        self.get_json("/v1/summary", &[("source", WIFI_SOURCE.to_string())])
            .await
    }

    async fn fetch_wifi_sales(&self, limit: usize) -> Result<Vec<SaleEntry>, SourceError> {
        self.get_json(
            "/v1/ticker",
            &[("limit", limit.to_string()), ("source", WIFI_SOURCE.to_string())],
        )
        .await
    }

    async fn fetch_wifi_config(&self) -> Result<WifiConfig, SourceError> {
        self.get_json("/v1/wifi/config", &[]).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

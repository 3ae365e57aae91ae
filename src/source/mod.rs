//! The venue backend as seen by the display.
//!
//! Everything the engine knows about sales and milestones arrives through
//! [`EventSource`]. All calls are read-only and may fail; failures come back
//! as [`SourceError`] and never cross into the timer loops as panics.

mod http;

pub use http::{HttpEventSource, HttpSourceConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::models::{
    LeaderboardMetric, MerchantLeaderboardRow, MilestoneEvent, ProductLeaderboardRow, SaleEntry,
    SceneRecord, Summary, WifiConfig,
};

#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_summary(&self) -> Result<Summary, SourceError>;

    /// Most recent sales, newest first, at most `limit` rows.
    async fn fetch_recent_events(&self, limit: usize) -> Result<Vec<SaleEntry>, SourceError>;

    /// Milestone triggers that fired strictly after `since`.
    async fn fetch_milestone_triggers(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<MilestoneEvent>, SourceError>;

    async fn fetch_scene_configuration(&self) -> Result<Vec<SceneRecord>, SourceError>;

    /// Top merchants by `metric` over a time-window label such as `"30m"`
    /// or `"all"`.
    async fn fetch_merchant_leaderboard(
        &self,
        metric: LeaderboardMetric,
        window: &str,
        limit: usize,
    ) -> Result<Vec<MerchantLeaderboardRow>, SourceError>;

    async fn fetch_product_leaderboard(
        &self,
        metric: LeaderboardMetric,
        limit: usize,
    ) -> Result<Vec<ProductLeaderboardRow>, SourceError>;

    /// Summary restricted to wifi upgrade sales.
    async fn fetch_wifi_summary(&self) -> Result<Summary, SourceError>;

    async fn fetch_wifi_sales(&self, limit: usize) -> Result<Vec<SaleEntry>, SourceError>;

    async fn fetch_wifi_config(&self) -> Result<WifiConfig, SourceError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

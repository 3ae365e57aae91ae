use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::models::{
    LeaderboardMetric, MerchantLeaderboardRow, ProductLeaderboardRow, SaleEntry, Summary, WifiConfig,
};
use crate::source::EventSource;

use super::aggregate::{aggregate, newest_sale, window_minutes_for, TrendEvent, TrendPoint};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub refresh_interval: Duration,
    pub ticker_limit: usize,
    pub leaderboard_limit: usize,
    /// Time-window label such as `"30m"` or `"all"`.
    pub time_window: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(10),
            ticker_limit: 50,
            leaderboard_limit: 10,
            time_window: "all".into(),
        }
    }
}

/// Latest data for every built-in scene.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub summary: Option<Summary>,
    pub sales: Vec<SaleEntry>,
    pub trend: Vec<TrendPoint>,
    pub newest_sale: Option<DateTime<Utc>>,
    pub merchants_by_transactions: Vec<MerchantLeaderboardRow>,
    pub merchants_by_volume: Vec<MerchantLeaderboardRow>,
    pub products_by_transactions: Vec<ProductLeaderboardRow>,
    pub products_by_volume: Vec<ProductLeaderboardRow>,
    pub wifi_summary: Option<Summary>,
    pub wifi_sales: Vec<SaleEntry>,
    pub wifi_config: Option<WifiConfig>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Periodically refreshes the overview, leaderboard and wifi data and keeps
/// the trend series current. A failed fetch keeps the previous value for
/// that part.
pub struct DashboardFeed {
    source: Arc<dyn EventSource>,
    config: FeedConfig,
    latest: Arc<Mutex<DashboardSnapshot>>,
    snapshot_tx: Arc<watch::Sender<DashboardSnapshot>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl DashboardFeed {
    pub fn new(source: Arc<dyn EventSource>, config: FeedConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(DashboardSnapshot::default());
        Self {
            source,
            config,
            latest: Arc::new(Mutex::new(DashboardSnapshot::default())),
            snapshot_tx: Arc::new(snapshot_tx),
            handle: None,
            cancel_token: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.latest.lock().await.clone()
    }

    /// Refreshes immediately, then every `refresh_interval`.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let cancel_token = CancellationToken::new();
        let refresher = Refresher {
            source: self.source.clone(),
            config: self.config.clone(),
            latest: self.latest.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
        };
        self.handle = Some(tokio::spawn(feed_loop(refresher, cancel_token.clone())));
        self.cancel_token = Some(cancel_token);
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Runs a single refresh outside the loop.
    pub async fn refresh(&self) -> DashboardSnapshot {
        Refresher {
            source: self.source.clone(),
            config: self.config.clone(),
            latest: self.latest.clone(),
            snapshot_tx: self.snapshot_tx.clone(),
        }
        .refresh(Utc::now())
        .await
    }
}

struct Refresher {
    source: Arc<dyn EventSource>,
    config: FeedConfig,
    latest: Arc<Mutex<DashboardSnapshot>>,
    snapshot_tx: Arc<watch::Sender<DashboardSnapshot>>,
}

impl Refresher {
    async fn refresh(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        let source = &self.source;
        let window = self.config.time_window.as_str();
        let board_limit = self.config.leaderboard_limit;
        let (
            summary,
            sales,
            merchants_by_transactions,
            merchants_by_volume,
            products_by_transactions,
            products_by_volume,
            wifi_summary,
            wifi_sales,
            wifi_config,
        ) = tokio::join!(
            source.fetch_summary(),
            source.fetch_recent_events(self.config.ticker_limit),
            source.fetch_merchant_leaderboard(LeaderboardMetric::Transactions, window, board_limit),
            source.fetch_merchant_leaderboard(LeaderboardMetric::Volume, window, board_limit),
            source.fetch_product_leaderboard(LeaderboardMetric::Transactions, board_limit),
            source.fetch_product_leaderboard(LeaderboardMetric::Volume, board_limit),
            source.fetch_wifi_summary(),
            source.fetch_wifi_sales(self.config.ticker_limit),
            source.fetch_wifi_config(),
        );

        let mut latest = self.latest.lock().await;
        keep(&mut latest.summary, summary.map(Some), "summary");
        keep(&mut latest.sales, sales, "ticker");
        keep(
            &mut latest.merchants_by_transactions,
            merchants_by_transactions,
            "merchant leaderboard (transactions)",
        );
        keep(
            &mut latest.merchants_by_volume,
            merchants_by_volume,
            "merchant leaderboard (volume)",
        );
        keep(
            &mut latest.products_by_transactions,
            products_by_transactions,
            "product leaderboard (transactions)",
        );
        keep(
            &mut latest.products_by_volume,
            products_by_volume,
            "product leaderboard (volume)",
        );
        keep(&mut latest.wifi_summary, wifi_summary.map(Some), "wifi summary");
        keep(&mut latest.wifi_sales, wifi_sales, "wifi ticker");
        keep(&mut latest.wifi_config, wifi_config.map(Some), "wifi config");

        // Recomputed even on failure so the window keeps sliding.
        let events: Vec<TrendEvent> = latest.sales.iter().map(TrendEvent::from).collect();
        latest.trend = aggregate(&events, window_minutes_for(&self.config.time_window), now);
        latest.newest_sale = newest_sale(&latest.sales);
        latest.refreshed_at = Some(now);

        let snapshot = latest.clone();
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

fn keep<T>(slot: &mut T, fetched: Result<T, SourceError>, part: &str) {
    match fetched {
        Ok(value) => *slot = value,
        Err(err) => log_warn!("{part} refresh failed: {err}"),
    }
}

async fn feed_loop(refresher: Refresher, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(refresher.config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresher.refresh(Utc::now()).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("dashboard feed shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::ScriptedSource;
    use chrono::TimeDelta;

    fn sale(id: i64, at: DateTime<Utc>, amount: i64) -> SaleEntry {
        SaleEntry {
            sale_id: id,
            merchant_id: "m1".into(),
            merchant_alias: "Coffee".into(),
            amount_sats: amount,
            sale_date: at,
        }
    }

    #[tokio::test]
    async fn refresh_builds_trend_from_sales() {
        let source = Arc::new(ScriptedSource::default());
        let now = Utc::now();
        source.push_summary(Ok(Summary {
            total_transactions: 3,
            ..Summary::default()
        }));
        source.push_sales(Ok(vec![
            sale(1, now - TimeDelta::minutes(2), 10),
            sale(2, now - TimeDelta::minutes(2), 5),
            sale(3, now - TimeDelta::minutes(90), 100),
        ]));

        let feed = DashboardFeed::new(
            source,
            FeedConfig {
                time_window: "30m".into(),
                ..FeedConfig::default()
            },
        );
        let snapshot = feed.refresh().await;

        assert_eq!(snapshot.summary.unwrap().total_transactions, 3);
        assert_eq!(snapshot.trend.len(), 1);
        assert_eq!(snapshot.trend[0].tx_count, 2);
        assert_eq!(snapshot.trend[0].volume, 15);
        assert_eq!(snapshot.newest_sale, Some(now - TimeDelta::minutes(2)));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_good_data() {
        let source = Arc::new(ScriptedSource::default());
        let now = Utc::now();
        source.push_summary(Ok(Summary {
            total_transactions: 9,
            ..Summary::default()
        }));
        source.push_sales(Ok(vec![sale(1, now - TimeDelta::minutes(1), 42)]));
        source.push_summary(Err(SourceError::Timeout("/v1/summary".into())));
        source.push_sales(Err(SourceError::Timeout("/v1/ticker".into())));

        let feed = DashboardFeed::new(source, FeedConfig::default());
        feed.refresh().await;
        let second = feed.refresh().await;

        assert_eq!(second.summary.unwrap().total_transactions, 9);
        assert_eq!(second.sales.len(), 1);
        assert_eq!(second.trend[0].volume, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_publishes_snapshots() {
        let source = Arc::new(ScriptedSource::default());
        source.push_summary(Ok(Summary {
            unique_products: 4,
            ..Summary::default()
        }));

        let mut feed = DashboardFeed::new(source, FeedConfig::default());
        let mut updates = feed.subscribe();
        feed.start();

        updates.changed().await.unwrap();
        assert_eq!(
            updates.borrow_and_update().summary.as_ref().unwrap().unique_products,
            4
        );
        feed.stop();
    }

    fn merchant(id: &str, transactions: i64, volume_sats: i64) -> MerchantLeaderboardRow {
        MerchantLeaderboardRow {
            merchant_id: id.into(),
            alias: id.to_uppercase(),
            transactions,
            volume_sats,
        }
    }

    #[tokio::test]
    async fn refresh_fills_merchant_and_wifi_scenes() {
        let source = Arc::new(ScriptedSource::default());
        source.push_merchant_board(
            LeaderboardMetric::Transactions,
            Ok(vec![merchant("m1", 30, 9000), merchant("m2", 12, 40000)]),
        );
        source.push_merchant_board(
            LeaderboardMetric::Volume,
            Ok(vec![merchant("m2", 12, 40000), merchant("m1", 30, 9000)]),
        );
        source.push_product_board(
            LeaderboardMetric::Volume,
            Ok(vec![ProductLeaderboardRow {
                merchant_id: "m1".into(),
                product_id: 7,
                name: "Latte".into(),
                transactions: 5,
                volume_sats: 10000,
            }]),
        );
        source.push_wifi_summary(Ok(Summary {
            total_transactions: 6,
            ..Summary::default()
        }));
        source.push_wifi_config(Ok(WifiConfig {
            duration_hours: 24.0,
            price_sats: "2100".into(),
        }));

        let feed = DashboardFeed::new(
            source.clone(),
            FeedConfig {
                time_window: "30m".into(),
                ..FeedConfig::default()
            },
        );
        let snapshot = feed.refresh().await;

        assert_eq!(snapshot.merchants_by_transactions[0].merchant_id, "m1");
        assert_eq!(snapshot.merchants_by_volume[0].merchant_id, "m2");
        assert_eq!(snapshot.products_by_volume[0].name, "Latte");
        assert!(snapshot.products_by_transactions.is_empty());
        assert_eq!(snapshot.wifi_summary.unwrap().total_transactions, 6);
        assert_eq!(snapshot.wifi_config.unwrap().price_sats(), Some(2100));
        assert_eq!(source.merchant_windows(), vec!["30m", "30m"]);
    }

    #[tokio::test]
    async fn failed_leaderboard_and_wifi_fetches_keep_last_good_rows() {
        let source = Arc::new(ScriptedSource::default());
        source.push_merchant_board(LeaderboardMetric::Volume, Ok(vec![merchant("m1", 3, 700)]));
        source.push_merchant_board(
            LeaderboardMetric::Volume,
            Err(SourceError::Timeout("/v1/leaderboard/merchants".into())),
        );
        source.push_wifi_config(Ok(WifiConfig {
            duration_hours: 12.0,
            price_sats: "1000".into(),
        }));
        source.push_wifi_config(Err(SourceError::Status {
            path: "/v1/wifi/config".into(),
            status: 503,
            body: String::new(),
        }));
        source.push_wifi_summary(Ok(Summary {
            total_volume_sats: 5000,
            ..Summary::default()
        }));
        source.push_wifi_summary(Err(SourceError::Timeout("/v1/summary".into())));

        let feed = DashboardFeed::new(source, FeedConfig::default());
        feed.refresh().await;
        let second = feed.refresh().await;

        assert_eq!(second.merchants_by_volume, vec![merchant("m1", 3, 700)]);
        assert_eq!(second.wifi_config.unwrap().duration_hours, 12.0);
        assert_eq!(second.wifi_summary.unwrap().total_volume_sats, 5000);
    }
}

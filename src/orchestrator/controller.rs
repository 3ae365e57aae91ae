use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::milestones::MilestoneDedupPoller;
use crate::models::{rotation_from_records, MilestoneEvent, SceneDescriptor};
use crate::rotation::{RotationStatus, SceneScheduler};
use crate::settings::DisplaySettings;
use crate::source::EventSource;
use crate::trends::{DashboardFeed, DashboardSnapshot};

use super::{Celebration, CelebrationEffect, CelebrationState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const SCENES_PATH: &str = "/v1/scenes";

/// What the rendering surface should show right now.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    /// Empty when there is no scene to show.
    pub scene_id: String,
    pub rotation: RotationStatus,
    pub celebration: Option<Celebration>,
}

/// Runs the scene rotation and interrupts it for milestone celebrations.
#[derive(Clone)]
pub struct DisplayOrchestrator {
    settings: Arc<DisplaySettings>,
    source: Arc<dyn EventSource>,
    scheduler: SceneScheduler,
    poller: Arc<Mutex<MilestoneDedupPoller>>,
    feed: Arc<Mutex<DashboardFeed>>,
    celebration: Arc<Mutex<CelebrationState>>,
    dwell_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    reduced_motion: Arc<watch::Sender<bool>>,
    snapshot_tx: Arc<watch::Sender<DisplaySnapshot>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl DisplayOrchestrator {
    pub fn new(source: Arc<dyn EventSource>, mut settings: DisplaySettings) -> Self {
        settings.sanitize();
        let scheduler = SceneScheduler::new(settings.scenes.clone());
        let poller = MilestoneDedupPoller::new(source.clone(), Utc::now(), settings.request_timeout());
        let feed = DashboardFeed::new(source.clone(), settings.feed_config());
        let (reduced_motion, _) = watch::channel(settings.reduced_motion);
        let (snapshot_tx, _) = watch::channel(DisplaySnapshot {
            scene_id: settings
                .scenes
                .first()
                .map(|scene| scene.id.clone())
                .unwrap_or_default(),
            rotation: RotationStatus::Stopped,
            celebration: None,
        });

        Self {
            settings: Arc::new(settings),
            source,
            scheduler,
            poller: Arc::new(Mutex::new(poller)),
            feed: Arc::new(Mutex::new(feed)),
            celebration: Arc::new(Mutex::new(CelebrationState::default())),
            dwell_timer: Arc::new(Mutex::new(None)),
            reduced_motion: Arc::new(reduced_motion),
            snapshot_tx: Arc::new(snapshot_tx),
            cancel_token: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts rotation, milestone polling, scene-config refresh and the
    /// dashboard feed. Calling it again while running does nothing.
    pub async fn start(&self) {
        let cancel_token = {
            let mut slot = self.cancel_token.lock().await;
            if slot.is_some() {
                warn!("display orchestrator already running");
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        self.scheduler.start().await;

        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        self.poller
            .lock()
            .await
            .start(self.settings.milestone_poll_interval(), deliveries_tx);
        self.feed.lock().await.start();

        tokio::spawn(self.clone().celebration_loop(deliveries_rx, cancel_token.clone()));
        tokio::spawn(self.clone().scene_refresh_loop(cancel_token.clone()));
        tokio::spawn(self.clone().snapshot_loop(cancel_token));

        self.publish_snapshot().await;
        info!("display orchestrator started via {}", self.source.name());
    }

    /// Stops every loop and timer. The display stays on its last scene.
    pub async fn shutdown(&self) {
        if let Some(token) = self.cancel_token.lock().await.take() {
            token.cancel();
        }

        self.poller.lock().await.stop().await;
        self.feed.lock().await.stop();

        {
            let mut celebration = self.celebration.lock().await;
            celebration.dismiss();
            if let Some(handle) = self.dwell_timer.lock().await.take() {
                handle.abort();
            }
        }

        self.scheduler.shutdown().await;
        self.publish_snapshot().await;
        info!("display orchestrator stopped");
    }

    pub async fn current_scene_id(&self) -> String {
        self.scheduler.current_scene_id().await
    }

    /// Operator advance.
    pub async fn skip(&self) {
        self.scheduler.skip().await;
    }

    /// Takes the celebration down early and resumes rotation.
    pub async fn dismiss(&self) {
        let mut celebration = self.celebration.lock().await;
        if let Some(handle) = self.dwell_timer.lock().await.take() {
            handle.abort();
        }
        if let Some(dismissed) = celebration.dismiss() {
            log_info!("celebration '{}' dismissed", dismissed.event.name);
            self.scheduler.resume().await;
        }
        drop(celebration);
        self.publish_snapshot().await;
    }

    /// Reduced-motion preference; only the next celebration's dwell is
    /// affected.
    pub fn set_reduced_motion(&self, reduced_motion: bool) {
        self.reduced_motion.send_replace(reduced_motion);
    }

    pub fn reduced_motion(&self) -> bool {
        *self.reduced_motion.borrow()
    }

    pub fn scheduler(&self) -> &SceneScheduler {
        &self.scheduler
    }

    pub async fn snapshot(&self) -> DisplaySnapshot {
        let rotation = self.scheduler.snapshot().await;
        let celebration = self.celebration.lock().await.active.clone();
        DisplaySnapshot {
            scene_id: rotation.scene_id,
            rotation: rotation.status,
            celebration,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn dashboard(&self) -> DashboardSnapshot {
        self.feed.lock().await.snapshot().await
    }

    pub async fn subscribe_dashboard(&self) -> watch::Receiver<DashboardSnapshot> {
        self.feed.lock().await.subscribe()
    }

    /// Shows `event`, replacing any celebration on screen, and (re)starts
    /// the dwell timer.
    pub async fn celebrate(&self, event: MilestoneEvent) {
        let dwell_ms = self.settings.celebration_dwell_ms(self.reduced_motion());
        let dwell = Duration::from_millis(dwell_ms);
        let celebration = Celebration {
            event,
            effect: CelebrationEffect::random(),
            shown_at: Utc::now(),
            dwell_ms,
        };
        log_info!(
            "celebrating '{}' with {:?} for {}ms",
            celebration.event.name,
            celebration.effect,
            celebration.dwell_ms
        );

        {
            let mut state = self.celebration.lock().await;
            let generation = state.show(celebration);
            self.scheduler.pause().await;

            let mut timer = self.dwell_timer.lock().await;
            if let Some(previous) = timer.take() {
                previous.abort();
            }
            *timer = Some(tokio::spawn(self.clone().dwell_expiry(dwell, generation)));
        }

        self.publish_snapshot().await;
    }

    async fn dwell_expiry(self, dwell: Duration, generation: u64) {
        time::sleep(dwell).await;

        {
            let mut state = self.celebration.lock().await;
            match state.expire(generation) {
                Ok(Some(expired)) => {
                    log_debug!("celebration '{}' finished", expired.event.name);
                    self.scheduler.resume().await;
                }
                Ok(None) | Err(_) => return,
            }
        }

        self.publish_snapshot().await;
    }

    async fn celebration_loop(
        self,
        mut deliveries: mpsc::UnboundedReceiver<MilestoneEvent>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                delivered = deliveries.recv() => match delivered {
                    Some(event) => self.celebrate(event).await,
                    None => break,
                },
                _ = cancel_token.cancelled() => break,
            }
        }
    }

    /// Swaps in the backend's scene list whenever it changes. Until the
    /// first successful fetch the settings rotation stays up; a failed
    /// fetch keeps whatever is current.
    async fn scene_refresh_loop(self, cancel_token: CancellationToken) {
        let mut ticker = time::interval(self.settings.scene_refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut applied: Option<Vec<SceneDescriptor>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let fetched = match time::timeout(
                        self.settings.request_timeout(),
                        self.source.fetch_scene_configuration(),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(SourceError::Timeout(SCENES_PATH.to_string())),
                    };

                    match fetched {
                        Ok(records) => {
                            let rotation = rotation_from_records(records);
                            if applied.as_ref() != Some(&rotation) {
                                self.scheduler.configure(rotation.clone()).await;
                                applied = Some(rotation);
                            }
                        }
                        Err(err) => log_warn!("scene configuration refresh failed: {err}"),
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
    }

    async fn snapshot_loop(self, cancel_token: CancellationToken) {
        let mut scenes = self.scheduler.subscribe();
        loop {
            tokio::select! {
                changed = scenes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.publish_snapshot().await;
                }
                _ = cancel_token.cancelled() => break,
            }
        }
    }

    async fn publish_snapshot(&self) {
        let snapshot = self.snapshot().await;
        self.snapshot_tx.send_replace(snapshot);
    }
}

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::error::DisplayError;
use crate::models::SceneDescriptor;

use super::{RotationState, RotationStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RotationSnapshot {
    pub status: RotationStatus,
    pub scene_id: String,
    pub active_index: usize,
    pub scene_count: usize,
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Rotates through the configured scenes, one dwell timer at a time.
///
/// Cheap to clone; clones share the same rotation.
#[derive(Clone)]
pub struct SceneScheduler {
    state: Arc<Mutex<RotationState>>,
    timer: Arc<Mutex<Option<ArmedTimer>>>,
    scene_tx: Arc<watch::Sender<String>>,
}

impl SceneScheduler {
    pub fn new(sequence: Vec<SceneDescriptor>) -> Self {
        let state = RotationState::new(sequence);
        let (scene_tx, _) = watch::channel(state.current_scene_id());

        Self {
            state: Arc::new(Mutex::new(state)),
            timer: Arc::new(Mutex::new(None)),
            scene_tx: Arc::new(scene_tx),
        }
    }

    pub async fn configure(&self, sequence: Vec<SceneDescriptor>) {
        let (rearm, scene_id, count) = {
            let mut state = self.state.lock().await;
            let rearm = state.configure(sequence);
            (rearm, state.current_scene_id(), state.sequence.len())
        };

        if count == 0 {
            log_warn!("scene rotation is empty; showing placeholder");
        } else {
            log_info!("rotation configured with {} scenes, active '{}'", count, scene_id);
        }

        if rearm {
            self.sync_timer().await;
        }
        self.publish(scene_id);
    }

    pub async fn start(&self) {
        let started = self.state.lock().await.start();
        if !started {
            return;
        }
        log_info!("scene rotation started");
        self.sync_timer().await;
    }

    pub async fn pause(&self) {
        let paused = self.state.lock().await.pause();
        if paused {
            log_debug!("scene rotation paused");
        }
        self.sync_timer().await;
    }

    /// Resumes with the full dwell of the current scene.
    pub async fn resume(&self) {
        let resumed = self.state.lock().await.resume();
        if resumed {
            log_debug!("scene rotation resumed");
            self.sync_timer().await;
        }
    }

    pub async fn skip(&self) {
        let scene_id = {
            let mut state = self.state.lock().await;
            state.skip();
            state.current_scene_id()
        };
        log_info!("skipped to scene '{}'", scene_id);
        self.sync_timer().await;
        self.publish(scene_id);
    }

    /// Stops the rotation and cancels the dwell timer.
    pub async fn shutdown(&self) {
        self.state.lock().await.stop();
        self.sync_timer().await;
    }

    pub async fn current_scene_id(&self) -> String {
        self.state.lock().await.current_scene_id()
    }

    pub async fn active_scene(&self) -> Result<SceneDescriptor, DisplayError> {
        self.state.lock().await.require_active_scene().cloned()
    }

    pub async fn snapshot(&self) -> RotationSnapshot {
        let state = self.state.lock().await;
        RotationSnapshot {
            status: state.status,
            scene_id: state.current_scene_id(),
            active_index: state.active_index,
            scene_count: state.sequence.len(),
        }
    }

    /// Receives the active scene id on every change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.scene_tx.subscribe()
    }

    fn publish(&self, scene_id: String) {
        self.scene_tx.send_replace(scene_id);
    }

    /// Brings the armed timer in line with the current state: a timer runs
    /// iff the rotation is running over a non-empty sequence, and it was
    /// armed at the current generation.
    async fn sync_timer(&self) {
        let mut slot = self.timer.lock().await;

        let (status, generation, has_scene) = {
            let state = self.state.lock().await;
            (state.status, state.generation, state.active_scene().is_some())
        };

        if let Some(armed) = slot.as_ref() {
            let still_valid = armed.generation == generation && !armed.handle.is_finished();
            if still_valid && status == RotationStatus::Running && has_scene {
                return;
            }
        }

        if let Some(armed) = slot.take() {
            armed.handle.abort();
        }

        if status != RotationStatus::Running || !has_scene {
            return;
        }

        let handle = tokio::spawn(rotation_loop(
            self.state.clone(),
            self.scene_tx.clone(),
            generation,
        ));
        *slot = Some(ArmedTimer { generation, handle });
    }
}

async fn rotation_loop(
    state: Arc<Mutex<RotationState>>,
    scene_tx: Arc<watch::Sender<String>>,
    generation: u64,
) {
    loop {
        let dwell = {
            let guard = state.lock().await;
            if guard.generation != generation || guard.status != RotationStatus::Running {
                break;
            }
            match guard.active_duration() {
                Some(dwell) => dwell,
                None => break,
            }
        };

        time::sleep(dwell).await;

        let scene_id = {
            let mut guard = state.lock().await;
            if guard.fire(generation).is_err() {
                break;
            }
            guard.current_scene_id()
        };

        log_debug!("scene advanced to '{}'", scene_id);
        scene_tx.send_replace(scene_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn two_scenes() -> Vec<SceneDescriptor> {
        vec![SceneDescriptor::new("a", 1000), SceneDescriptor::new("b", 1000)]
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn alternates_every_dwell() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;
        assert_eq!(scheduler.current_scene_id().await, "a");

        sleep_ms(1001).await;
        assert_eq!(scheduler.current_scene_id().await, "b");

        sleep_ms(1000).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_returns_to_first_scene() {
        let scheduler = SceneScheduler::new(vec![
            SceneDescriptor::new("overview", 100),
            SceneDescriptor::new("merchants", 200),
            SceneDescriptor::new("wifi", 300),
        ]);
        scheduler.start().await;

        sleep_ms(150).await;
        assert_eq!(scheduler.current_scene_id().await, "merchants");
        sleep_ms(200).await;
        assert_eq!(scheduler.current_scene_id().await, "wifi");
        sleep_ms(300).await;
        assert_eq!(scheduler.current_scene_id().await, "overview");
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_does_not_advance() {
        let scheduler = SceneScheduler::new(two_scenes());
        sleep_ms(5000).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        assert_eq!(scheduler.snapshot().await.status, RotationStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_resume_keeps_scene_and_restarts_dwell() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;

        sleep_ms(500).await;
        scheduler.pause().await;
        scheduler.resume().await;
        assert_eq!(scheduler.current_scene_id().await, "a");

        // Without the restart the flip would land at t=1000.
        sleep_ms(900).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        sleep_ms(200).await;
        assert_eq!(scheduler.current_scene_id().await, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn paused_rotation_holds_its_scene() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;
        scheduler.pause().await;
        scheduler.pause().await;

        sleep_ms(10_000).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        assert_eq!(scheduler.snapshot().await.status, RotationStatus::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_restarts_full_dwell_for_next_scene() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;

        sleep_ms(600).await;
        scheduler.skip().await;
        assert_eq!(scheduler.current_scene_id().await, "b");

        sleep_ms(900).await;
        assert_eq!(scheduler.current_scene_id().await, "b");
        sleep_ms(200).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn skip_while_paused_advances_without_timer() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;
        scheduler.pause().await;
        scheduler.skip().await;
        assert_eq!(scheduler.current_scene_id().await, "b");

        sleep_ms(3000).await;
        assert_eq!(scheduler.current_scene_id().await, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn single_scene_keeps_refreshing() {
        let scheduler = SceneScheduler::new(vec![SceneDescriptor::new("solo", 1000)]);
        let mut scenes = scheduler.subscribe();
        scheduler.start().await;

        sleep_ms(1001).await;
        assert!(scenes.has_changed().unwrap());
        assert_eq!(*scenes.borrow_and_update(), "solo");

        sleep_ms(1000).await;
        assert!(scenes.has_changed().unwrap());
        assert_eq!(scheduler.current_scene_id().await, "solo");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_rotation_reports_placeholder_until_configured() {
        let scheduler = SceneScheduler::new(Vec::new());
        scheduler.start().await;
        assert_eq!(scheduler.current_scene_id().await, "");
        assert!(matches!(
            scheduler.active_scene().await,
            Err(DisplayError::ConfigurationEmpty)
        ));

        scheduler.configure(two_scenes()).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        sleep_ms(1001).await;
        assert_eq!(scheduler.current_scene_id().await, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_with_same_duration_keeps_timer() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;

        sleep_ms(700).await;
        scheduler
            .configure(vec![
                SceneDescriptor::new("a", 1000),
                SceneDescriptor::new("c", 1000),
            ])
            .await;

        // Still the original timer: fires at t=1000.
        sleep_ms(400).await;
        assert_eq!(scheduler.current_scene_id().await, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_with_new_duration_rearms() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;

        sleep_ms(700).await;
        scheduler
            .configure(vec![
                SceneDescriptor::new("a", 2000),
                SceneDescriptor::new("b", 1000),
            ])
            .await;

        sleep_ms(1500).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        sleep_ms(600).await;
        assert_eq!(scheduler.current_scene_id().await, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_rotation_falls_back_to_first_scene() {
        let scheduler = SceneScheduler::new(vec![
            SceneDescriptor::new("a", 1000),
            SceneDescriptor::new("b", 1000),
            SceneDescriptor::new("c", 1000),
        ]);
        scheduler.skip().await;
        scheduler.skip().await;
        assert_eq!(scheduler.current_scene_id().await, "c");

        scheduler
            .configure(vec![SceneDescriptor::new("a", 1000)])
            .await;
        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.active_index, 0);
        assert_eq!(snapshot.scene_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_advance() {
        let scheduler = SceneScheduler::new(two_scenes());
        scheduler.start().await;
        sleep_ms(500).await;
        scheduler.shutdown().await;

        sleep_ms(5000).await;
        assert_eq!(scheduler.current_scene_id().await, "a");
        assert_eq!(scheduler.snapshot().await.status, RotationStatus::Stopped);
    }
}

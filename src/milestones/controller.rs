use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DisplayError;
use crate::models::MilestoneEvent;
use crate::source::EventSource;

use super::loop_worker::{poll_cycle, poll_loop, PollContext};
use super::Watermark;

/// Polls the source for milestone triggers and surfaces each one at most
/// once, newest first.
pub struct MilestoneDedupPoller {
    ctx: PollContext,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MilestoneDedupPoller {
    /// `since` seeds the watermark; triggers at or before it are never
    /// delivered.
    pub fn new(source: Arc<dyn EventSource>, since: DateTime<Utc>, request_timeout: Duration) -> Self {
        Self {
            ctx: PollContext {
                source,
                watermark: Arc::new(Mutex::new(Watermark::new(since))),
                epoch: Arc::new(AtomicU64::new(0)),
                request_timeout,
            },
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        self.ctx.watermark.lock().await.at()
    }

    /// Starts polling every `poll_interval`, the first poll right away.
    /// Delivered events go to `deliveries`.
    pub fn start(
        &mut self,
        poll_interval: Duration,
        deliveries: mpsc::UnboundedSender<MilestoneEvent>,
    ) {
        if self.is_running() {
            warn!("milestone poller already running");
            return;
        }

        let cancel_token = CancellationToken::new();
        let epoch = self.ctx.epoch.load(Ordering::SeqCst);

        let handle = tokio::spawn(poll_loop(
            self.ctx.clone(),
            epoch,
            poll_interval,
            deliveries,
            cancel_token.clone(),
        ));

        info!(
            "milestone poller started (every {}ms via {})",
            poll_interval.as_millis(),
            self.ctx.source.name()
        );
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Stops polling. A fetch already in flight is left to finish and its
    /// result is dropped.
    pub async fn stop(&mut self) {
        {
            // Bumping under the watermark lock orders this against any cycle
            // that is about to deliver.
            let _watermark = self.ctx.watermark.lock().await;
            self.ctx.epoch.fetch_add(1, Ordering::SeqCst);
        }

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        // Detached: the loop exits on its own once the fetch settles.
        self.handle.take();
    }

    /// Runs one poll cycle outside the timer and returns the delivered
    /// event, if any, to the caller.
    pub async fn poll_once(&self) -> Result<Option<MilestoneEvent>, DisplayError> {
        let epoch = self.ctx.epoch.load(Ordering::SeqCst);
        poll_cycle(&self.ctx, epoch, None).await
    }
}

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::{mpsc, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{DisplayError, SourceError};
use crate::models::MilestoneEvent;
use crate::source::EventSource;

use super::Watermark;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const TRIGGERS_PATH: &str = "/v1/milestones/triggers";

/// State shared between the poller handle and its loop.
#[derive(Clone)]
pub(crate) struct PollContext {
    pub source: Arc<dyn EventSource>,
    pub watermark: Arc<Mutex<Watermark>>,
    pub epoch: Arc<AtomicU64>,
    pub request_timeout: Duration,
}

/// One poll: fetch everything after the watermark, advance it, and hand at
/// most one event to `deliveries`.
///
/// The watermark read, the fetch and the update are not interleaved with
/// other cycles of the same epoch; a result that lands after the epoch
/// moved on is discarded without touching the watermark.
pub(crate) async fn poll_cycle(
    ctx: &PollContext,
    epoch: u64,
    deliveries: Option<&mpsc::UnboundedSender<MilestoneEvent>>,
) -> Result<Option<MilestoneEvent>, DisplayError> {
    let since = ctx.watermark.lock().await.at();

    let fetched = match tokio::time::timeout(
        ctx.request_timeout,
        ctx.source.fetch_milestone_triggers(since),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(TRIGGERS_PATH.to_string())),
    };

    let mut watermark = ctx.watermark.lock().await;
    if ctx.epoch.load(Ordering::SeqCst) != epoch {
        return Err(DisplayError::ShutdownRace);
    }

    let batch = fetched?;
    let delivered = watermark.absorb(batch)?;

    if let (Some(event), Some(tx)) = (delivered.as_ref(), deliveries) {
        if tx.send(event.clone()).is_err() {
            return Err(DisplayError::ShutdownRace);
        }
    }

    Ok(delivered)
}

pub(crate) async fn poll_loop(
    ctx: PollContext,
    epoch: u64,
    poll_interval: Duration,
    deliveries: mpsc::UnboundedSender<MilestoneEvent>,
    cancel_token: CancellationToken,
) {
    // The first tick completes immediately.
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poll_cycle(&ctx, epoch, Some(&deliveries)).await {
                    Ok(Some(event)) => log_info!(
                        "milestone '{}' (id {}) triggered at {}",
                        event.name, event.id, event.triggered_at
                    ),
                    Ok(None) => {}
                    Err(DisplayError::ShutdownRace) => break,
                    Err(err @ DisplayError::StaleResponse { .. }) => log_debug!("ignoring {err}"),
                    Err(err) => log_warn!(
                        "milestone poll via {} failed, retrying next tick: {err}",
                        ctx.source.name()
                    ),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("milestone poller shutting down");
                break;
            }
        }
    }
}

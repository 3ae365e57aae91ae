use chrono::{DateTime, Utc};

use crate::error::DisplayError;
use crate::models::MilestoneEvent;

/// Boundary below which milestone triggers count as already seen.
///
/// Only moves forward. Everything delivered so far has a `triggered_at` at
/// or below it, which is what keeps a trigger from surfacing twice without
/// remembering individual ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Folds one poll's batch into the watermark and picks what to show.
    ///
    /// At most one event comes back: the newest one strictly after the
    /// watermark as it stood before this batch. Older members of the batch
    /// are dropped. A batch with nothing newer than the watermark is a stale
    /// response and leaves it untouched.
    pub fn absorb(
        &mut self,
        batch: Vec<MilestoneEvent>,
    ) -> Result<Option<MilestoneEvent>, DisplayError> {
        let Some(newest) = batch.into_iter().max_by(|a, b| a.cmp_key(b)) else {
            return Ok(None);
        };

        if newest.triggered_at <= self.at {
            return Err(DisplayError::StaleResponse {
                newest: newest.triggered_at,
                watermark: self.at,
            });
        }

        self.at = newest.triggered_at;
        Ok(Some(newest))
    }
}

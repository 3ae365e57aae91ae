use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    Transactions,
    Volume,
}

/// A milestone crossing reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneEvent {
    pub id: i64,
    pub milestone_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MilestoneKind,
    pub threshold: i64,
    pub triggered_at: DateTime<Utc>,
    pub total_transactions: i64,
    #[serde(rename = "total_volume_sats")]
    pub total_volume: i64,
}

impl MilestoneEvent {
    /// Orders by trigger time, then id.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.triggered_at
            .cmp(&other.triggered_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

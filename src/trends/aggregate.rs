use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SaleEntry;

const ALL_TIME_WINDOW_MINUTES: u32 = 24 * 60;
const DEFAULT_WINDOW_MINUTES: u32 = 60;

/// A single sale as the aggregator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: i64,
}

impl From<&SaleEntry> for TrendEvent {
    fn from(sale: &SaleEntry) -> Self {
        Self {
            timestamp: sale.sale_date,
            amount: sale.amount_sats,
        }
    }
}

/// One minute of activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub minute_start: DateTime<Utc>,
    pub tx_count: u64,
    pub volume: i64,
}

/// Buckets events into per-minute points covering `[now - window, now]`.
///
/// Minutes without events are left out rather than zero-filled. The result
/// depends only on the set of events and `now`, not on input order.
pub fn aggregate(events: &[TrendEvent], window_minutes: u32, now: DateTime<Utc>) -> Vec<TrendPoint> {
    let cutoff = now - TimeDelta::minutes(i64::from(window_minutes));
    let mut buckets: BTreeMap<DateTime<Utc>, (u64, i64)> = BTreeMap::new();

    for event in events {
        if event.timestamp < cutoff || event.timestamp > now {
            continue;
        }
        let Ok(minute) = event.timestamp.duration_trunc(TimeDelta::minutes(1)) else {
            continue;
        };
        let bucket = buckets.entry(minute).or_insert((0, 0));
        bucket.0 += 1;
        bucket.1 += event.amount;
    }

    buckets
        .into_iter()
        .map(|(minute_start, (tx_count, volume))| TrendPoint {
            minute_start,
            tx_count,
            volume,
        })
        .collect()
}

/// Window length for a time-window label: `"all"` is one day, `"<n>m"`
/// and `"<n>h"` are minutes and hours; anything else is an hour.
pub fn window_minutes_for(label: &str) -> u32 {
    let label = label.trim().to_ascii_lowercase();
    if label == "all" {
        return ALL_TIME_WINDOW_MINUTES;
    }

    let (digits, per_unit) = if let Some(value) = label.strip_suffix('h') {
        (value, 60)
    } else if let Some(value) = label.strip_suffix('m') {
        (value, 1)
    } else {
        return DEFAULT_WINDOW_MINUTES;
    };

    digits
        .parse::<u32>()
        .ok()
        .and_then(|value| value.checked_mul(per_unit))
        .unwrap_or(DEFAULT_WINDOW_MINUTES)
}

pub fn newest_sale(sales: &[SaleEntry]) -> Option<DateTime<Utc>> {
    sales.iter().map(|sale| sale.sale_date).max()
}

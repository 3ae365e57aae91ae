use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the live sales ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleEntry {
    pub sale_id: i64,
    pub merchant_id: String,
    pub merchant_alias: String,
    pub amount_sats: i64,
    pub sale_date: DateTime<Utc>,
}

/// Headline numbers for the overview scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Summary {
    pub total_transactions: i64,
    pub total_volume_sats: i64,
    pub average_transaction_size: f64,
    pub active_merchants: i64,
    pub total_merchants: i64,
    pub unique_products: i64,
    pub transactions_per_minute: f64,
    pub volume_per_minute: f64,
}

use serde::{Deserialize, Serialize};

/// Ranking used by the leaderboard endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardMetric {
    Transactions,
    Volume,
}

impl LeaderboardMetric {
    pub const ALL: [LeaderboardMetric; 2] = [LeaderboardMetric::Transactions, LeaderboardMetric::Volume];

    /// Query-string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardMetric::Transactions => "transactions",
            LeaderboardMetric::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerchantLeaderboardRow {
    pub merchant_id: String,
    pub alias: String,
    pub transactions: i64,
    pub volume_sats: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductLeaderboardRow {
    pub merchant_id: String,
    pub product_id: i64,
    pub name: String,
    pub transactions: i64,
    pub volume_sats: i64,
}

/// Pricing shown on the wifi upgrade scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WifiConfig {
    pub duration_hours: f64,
    /// Served as a decimal string.
    pub price_sats: String,
}

impl WifiConfig {
    pub fn price_sats(&self) -> Option<i64> {
        self.price_sats.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_serializes_as_query_value() {
        for metric in LeaderboardMetric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }

    #[test]
    fn wifi_price_parses_from_string() {
        let config: WifiConfig =
            serde_json::from_str(r#"{"duration_hours":24,"price_sats":" 2100 "}"#).unwrap();
        assert_eq!(config.duration_hours, 24.0);
        assert_eq!(config.price_sats(), Some(2100));

        let unpriced = WifiConfig {
            price_sats: "free".into(),
            ..WifiConfig::default()
        };
        assert_eq!(unpriced.price_sats(), None);
    }
}

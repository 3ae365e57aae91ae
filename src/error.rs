use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures talking to the venue backend.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("invalid source configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DisplayError {
    /// Network or server failure during a poll. The cycle is skipped and
    /// retried on the next tick.
    #[error("transient fetch failure: {0}")]
    TransientFetch(#[from] SourceError),

    /// A poll resolved with nothing newer than the watermark.
    #[error("stale response: newest trigger {newest} is not after watermark {watermark}")]
    StaleResponse {
        newest: DateTime<Utc>,
        watermark: DateTime<Utc>,
    },

    #[error("scene rotation is empty")]
    ConfigurationEmpty,

    /// A timer or fetch completed after its owner was stopped.
    #[error("callback arrived after shutdown")]
    ShutdownRace,
}

impl DisplayError {
    /// Whether this outcome should be reported as a failure in the logs.
    pub fn is_reportable(&self) -> bool {
        matches!(self, DisplayError::TransientFetch(_))
    }
}

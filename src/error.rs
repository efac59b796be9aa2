use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Alert check ran too soon: last run {seconds_since_last_run}s ago, minimum interval is {min_interval_s}s")]
    TooSoon {
        seconds_since_last_run: i64,
        min_interval_s: i64,
    },

    #[error("No active alert for setting {0}")]
    AlertNotFound(Uuid),

    #[error("Clip unavailable: {0}")]
    ClipUnavailable(String),

    #[error("Notification delivery failed via {channel}: {message}")]
    NotificationDelivery { channel: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors scoped to a single alert are collected by batch passes instead
    /// of aborting the whole batch.
    pub fn is_per_alert(&self) -> bool {
        matches!(
            self,
            Error::ClipUnavailable(_)
                | Error::NotificationDelivery { .. }
                | Error::AlertNotFound(_)
        )
    }
}

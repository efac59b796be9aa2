use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Event types published by the perception engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    // Alert lifecycle events
    AlertOpened,
    AlertExtended,
    AlertClosed,
    AlertReopened,

    // Notification events
    NotificationSent,
    NotificationFailed,
    EmailRequested,
    SmsRequested,

    // Ingestion / maintenance events
    DetectionBatchIngested,
    RetentionSweepCompleted,

    // System events
    SystemStartup,
    SystemShutdown,

    // Custom event
    Custom(String),
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlertOpened => write!(f, "alert.opened"),
            Self::AlertExtended => write!(f, "alert.extended"),
            Self::AlertClosed => write!(f, "alert.closed"),
            Self::AlertReopened => write!(f, "alert.reopened"),
            Self::NotificationSent => write!(f, "notification.sent"),
            Self::NotificationFailed => write!(f, "notification.failed"),
            Self::EmailRequested => write!(f, "notification.email_requested"),
            Self::SmsRequested => write!(f, "notification.sms_requested"),
            Self::DetectionBatchIngested => write!(f, "detection.batch_ingested"),
            Self::RetentionSweepCompleted => write!(f, "detection.retention_sweep_completed"),
            Self::SystemStartup => write!(f, "system.startup"),
            Self::SystemShutdown => write!(f, "system.shutdown"),
            Self::Custom(name) => write!(f, "custom.{}", name),
        }
    }
}

/// Event message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Unique event ID
    pub id: Uuid,
    /// Event type
    pub event_type: EventType,
    /// Event source ID (e.g. alert setting ID or camera ID)
    pub source_id: Option<Uuid>,
    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Event data payload
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// Create a new event message
    pub fn new<T: Serialize>(
        event_type: EventType,
        source_id: Option<Uuid>,
        payload: T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type,
            source_id,
            timestamp: chrono::Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Get the routing key for the event
    pub fn routing_key(&self) -> String {
        match &self.source_id {
            Some(id) => format!("{}.{}", self.event_type, id),
            None => self.event_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_includes_source() {
        let source = Uuid::new_v4();
        let event = EventMessage::new(
            EventType::AlertOpened,
            Some(source),
            serde_json::json!({"camera_id": "c1"}),
        )
        .unwrap();
        assert_eq!(event.routing_key(), format!("alert.opened.{}", source));

        let event = EventMessage::new(EventType::SystemStartup, None, serde_json::Value::Null).unwrap();
        assert_eq!(event.routing_key(), "system.startup");
    }
}

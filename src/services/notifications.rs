use crate::error::Error;
use crate::messaging::broker::EventSink;
use crate::messaging::event::{EventMessage, EventType};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Email dispatch boundary. Delivery failures surface as typed errors and are
/// collected by the caller, never propagated out of a notification batch.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMS dispatch boundary.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, recipient: &str, body: &str) -> Result<()>;
}

/// Queue-backed sender: hands messages to the platform's delivery workers via
/// the message broker rather than talking to an SMTP/SMS gateway directly.
pub struct BrokerNotificationSender {
    sink: Arc<dyn EventSink>,
    email_from: String,
}

impl BrokerNotificationSender {
    pub fn new(sink: Arc<dyn EventSink>, email_from: impl Into<String>) -> Self {
        Self {
            sink,
            email_from: email_from.into(),
        }
    }
}

#[async_trait]
impl EmailSender for BrokerNotificationSender {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let event = EventMessage::new(
            EventType::EmailRequested,
            None,
            serde_json::json!({
                "from": self.email_from,
                "to": recipient,
                "subject": subject,
                "body": body,
            }),
        )
        .map_err(|e| Error::Serialization(e.to_string()))?;

        self.sink.publish_event(event).await.map_err(|e| {
            Error::NotificationDelivery {
                channel: "email".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl SmsSender for BrokerNotificationSender {
    async fn send_sms(&self, recipient: &str, body: &str) -> Result<()> {
        let event = EventMessage::new(
            EventType::SmsRequested,
            None,
            serde_json::json!({
                "to": recipient,
                "body": body,
            }),
        )
        .map_err(|e| Error::Serialization(e.to_string()))?;

        self.sink.publish_event(event).await.map_err(|e| {
            Error::NotificationDelivery {
                channel: "sms".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

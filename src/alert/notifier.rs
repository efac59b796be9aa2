use crate::config::{AlertingConfig, NotificationConfig};
use crate::db::models::alert_models::{PendingAlert, SharedClip, TriggerType};
use crate::db::repositories::{SharedClipsRepository, UserAlertsRepository};
use crate::messaging::broker::EventSink;
use crate::messaging::event::{EventMessage, EventType};
use crate::services::clips::ClipService;
use crate::services::notifications::{EmailSender, SmsSender};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use log::{info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one notification dispatch pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub considered: usize,
    pub sent: usize,
    pub deferred: usize,
    pub failed: Vec<(Uuid, String)>,
}

/// Whether an alert has been active long enough to be worth notifying.
/// Spurious one-frame alerts die here instead of paging anyone.
pub fn is_ripe(pending: &PendingAlert, now: DateTime<Utc>, min_active: Duration) -> bool {
    now - pending.start_time > min_active
}

/// Subject and body of the notification for an alert.
pub fn notification_text(pending: &PendingAlert, share_url: &str) -> (String, String) {
    let subject = format!("Alert: {}", pending.setting_name);
    let body = format!(
        "{} alert \"{}\" triggered at {}.\nClip: {}",
        match pending.trigger_type {
            TriggerType::Idling => "Idling",
            TriggerType::DoNotEnter => "Do-not-enter",
        },
        pending.setting_name,
        pending.start_time.to_rfc3339(),
        share_url
    );
    (subject, body)
}

/// Dispatches notifications for active alerts that have not been notified
/// yet. Each alert is notified at most once; failures leave the alert unsent
/// so the next pass retries it.
pub struct AlertNotifier {
    alerts: UserAlertsRepository,
    shared_clips: SharedClipsRepository,
    clips: Arc<dyn ClipService>,
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    sink: Arc<dyn EventSink>,
    alerting: AlertingConfig,
    notification: NotificationConfig,
}

impl AlertNotifier {
    /// Create a new alert notifier
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<PgPool>,
        clips: Arc<dyn ClipService>,
        email: Arc<dyn EmailSender>,
        sms: Arc<dyn SmsSender>,
        sink: Arc<dyn EventSink>,
        alerting: AlertingConfig,
        notification: NotificationConfig,
    ) -> Self {
        Self {
            alerts: UserAlertsRepository::new(pool.clone()),
            shared_clips: SharedClipsRepository::new(pool),
            clips,
            email,
            sms,
            sink,
            alerting,
            notification,
        }
    }

    fn min_active_duration(&self, trigger_type: TriggerType) -> Duration {
        match trigger_type {
            TriggerType::Idling => Duration::seconds(self.alerting.idle_min_active_duration_s),
            TriggerType::DoNotEnter => {
                Duration::seconds(self.alerting.do_not_enter_min_active_duration_s)
            }
        }
    }

    /// Run one dispatch pass for a trigger type. Alerts that have not been
    /// active long enough are deferred to a later pass; per-alert failures
    /// are collected and reported, never propagated.
    pub async fn notify_pending(
        &self,
        trigger_type: TriggerType,
        now: DateTime<Utc>,
    ) -> Result<NotificationReport> {
        let pending = self.alerts.list_pending_notification(trigger_type).await?;
        let min_active = self.min_active_duration(trigger_type);

        let mut report = NotificationReport {
            considered: pending.len(),
            ..NotificationReport::default()
        };

        let (ripe, young): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|p| is_ripe(p, now, min_active));
        report.deferred = young.len();

        let outcomes = join_all(
            ripe.iter()
                .map(|pending| self.notify_one(pending, now)),
        )
        .await;

        for (pending, outcome) in ripe.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(
                        "Notification for alert {} ({}) failed, will retry: {}",
                        pending.alert_id, pending.setting_name, e
                    );
                    report.failed.push((pending.alert_id, e.to_string()));
                }
            }
        }

        if !report.failed.is_empty() {
            self.report_failures(trigger_type, &report).await;
        }
        if report.considered > 0 {
            info!(
                "Notification pass for {}: {} considered, {} sent, {} deferred, {} failed",
                trigger_type,
                report.considered,
                report.sent,
                report.deferred,
                report.failed.len()
            );
        }
        Ok(report)
    }

    async fn notify_one(&self, pending: &PendingAlert, now: DateTime<Utc>) -> Result<()> {
        let handle = self
            .clips
            .request_clip(pending.camera_id, pending.start_time, pending.end_time)
            .await?;

        let clip = self
            .shared_clips
            .create(&SharedClip {
                id: Uuid::new_v4(),
                alert_id: pending.alert_id,
                camera_id: pending.camera_id,
                start_time: pending.start_time,
                end_time: pending.end_time,
                clip_url: handle.url,
                share_token: Uuid::new_v4(),
                created_at: now,
            })
            .await?;

        let share_url = format!(
            "{}/{}",
            self.notification.share_base_url.trim_end_matches('/'),
            clip.share_token
        );
        let (subject, body) = notification_text(pending, &share_url);

        if let Some(email) = &pending.notify_email {
            self.email.send_email(email, &subject, &body).await?;
        }
        if let Some(phone) = &pending.notify_phone {
            self.sms.send_sms(phone, &body).await?;
        }

        self.alerts.mark_sent(&pending.alert_id, now).await?;

        let event = EventMessage::new(
            EventType::NotificationSent,
            Some(pending.setting_id),
            serde_json::json!({
                "alert_id": pending.alert_id,
                "camera_id": pending.camera_id,
                "share_token": clip.share_token,
            }),
        );
        match event {
            Ok(event) => {
                if let Err(e) = self.sink.publish_event(event).await {
                    warn!("Failed to publish notification event: {}", e);
                }
            }
            Err(e) => warn!("Failed to build notification event: {}", e),
        }
        Ok(())
    }

    /// Operator-facing report of alerts that could not be notified.
    async fn report_failures(&self, trigger_type: TriggerType, report: &NotificationReport) {
        let event = EventMessage::new(
            EventType::NotificationFailed,
            None,
            serde_json::json!({
                "trigger_type": trigger_type,
                "failures": report
                    .failed
                    .iter()
                    .map(|(id, message)| serde_json::json!({
                        "alert_id": id,
                        "error": message,
                    }))
                    .collect::<Vec<_>>(),
            }),
        );
        match event {
            Ok(event) => {
                if let Err(e) = self.sink.publish_event(event).await {
                    warn!("Failed to publish notification failure report: {}", e);
                }
            }
            Err(e) => warn!("Failed to build notification failure report: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(trigger_type: TriggerType, age_s: i64, now: DateTime<Utc>) -> PendingAlert {
        PendingAlert {
            alert_id: Uuid::new_v4(),
            setting_id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            trigger_type,
            setting_name: "loading dock".to_string(),
            start_time: now - Duration::seconds(age_s),
            end_time: now,
            notify_email: Some("ops@example.com".to_string()),
            notify_phone: None,
        }
    }

    #[test]
    fn young_alerts_are_not_ripe() {
        let now = Utc::now();
        assert!(!is_ripe(
            &pending(TriggerType::Idling, 30, now),
            now,
            Duration::seconds(60)
        ));
        assert!(is_ripe(
            &pending(TriggerType::Idling, 90, now),
            now,
            Duration::seconds(60)
        ));
    }

    #[test]
    fn notification_text_names_trigger_and_clip() {
        let now = Utc::now();
        let (subject, body) = notification_text(
            &pending(TriggerType::DoNotEnter, 120, now),
            "https://share.example.com/abc",
        );
        assert_eq!(subject, "Alert: loading dock");
        assert!(body.starts_with("Do-not-enter alert"));
        assert!(body.contains("https://share.example.com/abc"));
    }
}

use crate::alert::matcher::AlertMatcher;
use crate::alert::notifier::AlertNotifier;
use crate::config::{AlertingConfig, RetentionConfig};
use crate::db::models::alert_models::TriggerType;
use crate::db::repositories::DetectionsRepository;
use crate::error::Error;
use crate::messaging::broker::EventSink;
use crate::messaging::event::{EventMessage, EventType};
use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Drives the periodic alert pipeline: matching cycles per trigger type,
/// the notification dispatch pass, and the detection retention sweep.
pub struct AlertScheduler {
    matcher: Arc<AlertMatcher>,
    notifier: Arc<AlertNotifier>,
    detections: DetectionsRepository,
    sink: Arc<dyn EventSink>,
    alerting: AlertingConfig,
    retention: RetentionConfig,
}

impl AlertScheduler {
    /// Create a new alert scheduler
    pub fn new(
        pool: Arc<PgPool>,
        matcher: Arc<AlertMatcher>,
        notifier: Arc<AlertNotifier>,
        sink: Arc<dyn EventSink>,
        alerting: AlertingConfig,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            matcher,
            notifier,
            detections: DetectionsRepository::new(pool),
            sink,
            alerting,
            retention,
        }
    }

    /// Start the alert scheduler service
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!("Starting alert scheduler service");

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                scheduler.alerting.do_not_enter_check_interval_s as u64,
            ));
            loop {
                ticker.tick().await;
                scheduler.run_matcher(TriggerType::DoNotEnter).await;
            }
        });

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                scheduler.alerting.idle_alert_check_interval_s as u64,
            ));
            loop {
                ticker.tick().await;
                scheduler.run_matcher(TriggerType::Idling).await;
            }
        });

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                scheduler.alerting.notification_check_interval_s as u64,
            ));
            loop {
                ticker.tick().await;
                scheduler.run_notifier(TriggerType::DoNotEnter).await;
                scheduler.run_notifier(TriggerType::Idling).await;
            }
        });

        if self.retention.enabled {
            let scheduler = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(scheduler.retention.check_interval_secs));
                loop {
                    ticker.tick().await;
                    if let Err(e) = scheduler.run_retention_sweep().await {
                        error!("Detection retention sweep failed: {}", e);
                    }
                }
            });
        }

        Ok(())
    }

    async fn run_matcher(&self, trigger_type: TriggerType) {
        match self.matcher.match_user_alerts(trigger_type, Utc::now()).await {
            Ok(_) => {}
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::TooSoon { .. }) => {
                    info!("Skipping {} matching cycle: {}", trigger_type, e);
                }
                _ => error!("Alert matching cycle for {} failed: {}", trigger_type, e),
            },
        }
    }

    async fn run_notifier(&self, trigger_type: TriggerType) {
        if let Err(e) = self.notifier.notify_pending(trigger_type, Utc::now()).await {
            error!("Notification pass for {} failed: {}", trigger_type, e);
        }
    }

    async fn run_retention_sweep(&self) -> Result<()> {
        let cutoff = Utc::now() - chrono::Duration::days(self.retention.detection_retention_days);
        let deleted = self.detections.delete_older_than(cutoff).await?;
        info!("Retention sweep removed {} detections older than {}", deleted, cutoff);

        let event = EventMessage::new(
            EventType::RetentionSweepCompleted,
            None,
            serde_json::json!({
                "cutoff": cutoff,
                "deleted": deleted,
            }),
        );
        match event {
            Ok(event) => {
                if let Err(e) = self.sink.publish_event(event).await {
                    warn!("Failed to publish retention sweep event: {}", e);
                }
            }
            Err(e) => warn!("Failed to build retention sweep event: {}", e),
        }
        Ok(())
    }
}

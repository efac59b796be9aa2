use anyhow::Result;
use argus_perception::alert::{AlertMatcher, AlertNotifier, AlertScheduler};
use argus_perception::config;
use argus_perception::db::DatabaseService;
use argus_perception::messaging::broker::{create_message_broker, EventSink};
use argus_perception::messaging::event::{EventMessage, EventType};
use argus_perception::services::clips::ArchiveClipService;
use argus_perception::services::notifications::BrokerNotificationSender;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

async fn run_app() -> Result<()> {
    // Initialize logging
    env_logger::init();
    info!("Starting Argus perception engine");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;
    info!("Configuration loaded");

    // Database connection pool and migrations
    let database = DatabaseService::new(&config.database).await?;
    let db_pool = database.pool.clone();

    // Create and initialize message broker
    let message_broker = create_message_broker(config.message_broker.clone()).await?;
    info!("Message broker initialized");

    // Publish system startup event
    if let Err(e) = message_broker
        .publish(
            EventType::SystemStartup,
            None,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }),
        )
        .await
    {
        warn!("Failed to publish system startup event: {}", e);
    }

    let sink: Arc<dyn EventSink> = message_broker.clone();

    // Notification plumbing: archive-backed clips, queue-backed email/SMS
    let clips = Arc::new(ArchiveClipService::new(
        config.notification.clip_base_url.clone(),
    ));
    let sender = Arc::new(BrokerNotificationSender::new(
        sink.clone(),
        config.notification.email_from.clone(),
    ));

    let matcher = Arc::new(AlertMatcher::new(
        db_pool.clone(),
        sink.clone(),
        config.alerting.clone(),
        config.aggregation.clone(),
    ));
    let notifier = Arc::new(AlertNotifier::new(
        db_pool.clone(),
        clips,
        sender.clone(),
        sender,
        sink.clone(),
        config.alerting.clone(),
        config.notification.clone(),
    ));

    let scheduler = Arc::new(AlertScheduler::new(
        db_pool,
        matcher,
        notifier,
        sink.clone(),
        config.alerting.clone(),
        config.retention.clone(),
    ));
    scheduler.start().await?;
    info!("Alert scheduler started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    if let Err(e) = sink
        .publish_event(EventMessage::new(
            EventType::SystemShutdown,
            None,
            serde_json::json!({
                "timestamp": chrono::Utc::now().to_rfc3339()
            }),
        )?)
        .await
    {
        warn!("Failed to publish system shutdown event: {}", e);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

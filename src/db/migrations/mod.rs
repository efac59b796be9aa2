use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

/// Ordered, embedded migration files. Execution order follows the numeric
/// prefix.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_detections.sql",
        include_str!("sql/001_create_detections.sql"),
    ),
    (
        "002_create_alert_settings.sql",
        include_str!("sql/002_create_alert_settings.sql"),
    ),
    (
        "003_create_user_alerts.sql",
        include_str!("sql/003_create_user_alerts.sql"),
    ),
    (
        "004_create_alert_runs.sql",
        include_str!("sql/004_create_alert_runs.sql"),
    ),
    (
        "005_create_shared_clips.sql",
        include_str!("sql/005_create_shared_clips.sql"),
    ),
];

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Applied migration: {}", name);
    }
    Ok(())
}

use crate::db::models::alert_models::TriggerType;
use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

/// Last-run watermark store for the alert matching cycles. One row per
/// trigger type; written only after a cycle completes successfully.
#[derive(Clone)]
pub struct AlertRunsRepository {
    pool: Arc<PgPool>,
}

impl AlertRunsRepository {
    /// Create a new alert runs repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get the last successful run time for a trigger type
    pub async fn get_last_run(&self, trigger_type: TriggerType) -> Result<Option<DateTime<Utc>>> {
        let result: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT last_run_time
            FROM alert_runs
            WHERE trigger_type = $1
            "#,
        )
        .bind(trigger_type)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get last alert run: {}", e)))?;

        Ok(result.map(|row| row.0))
    }

    /// Record a successful run for a trigger type
    pub async fn set_last_run(
        &self,
        trigger_type: TriggerType,
        run_time: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_runs (trigger_type, last_run_time)
            VALUES ($1, $2)
            ON CONFLICT (trigger_type) DO UPDATE SET last_run_time = EXCLUDED.last_run_time
            "#,
        )
        .bind(trigger_type)
        .bind(run_time)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to set last alert run: {}", e)))?;

        Ok(())
    }
}

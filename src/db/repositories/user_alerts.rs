use crate::db::models::alert_models::{PendingAlert, TriggerType, UserAlert};
use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// User alerts repository: the authoritative store of alert state
#[derive(Clone)]
pub struct UserAlertsRepository {
    pool: Arc<PgPool>,
}

impl UserAlertsRepository {
    /// Create a new user alerts repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get the active alert for a setting, if any. The partial unique index
    /// on (setting_id) WHERE is_active guarantees at most one row.
    pub async fn get_active_for_setting(&self, setting_id: &Uuid) -> Result<Option<UserAlert>> {
        let result = sqlx::query_as::<_, UserAlert>(
            r#"
            SELECT id, setting_id, start_time, end_time, is_active, alert_sent_time, created_at
            FROM user_alerts
            WHERE setting_id = $1 AND is_active
            "#,
        )
        .bind(setting_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get active alert: {}", e)))?;

        Ok(result)
    }

    /// Open a new active alert for a setting
    pub async fn create(
        &self,
        setting_id: &Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<UserAlert> {
        let result = sqlx::query_as::<_, UserAlert>(
            r#"
            INSERT INTO user_alerts (id, setting_id, start_time, end_time, is_active, created_at)
            VALUES ($1, $2, $3, $4, true, $5)
            RETURNING id, setting_id, start_time, end_time, is_active, alert_sent_time, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(setting_id)
        .bind(start_time)
        .bind(end_time)
        .bind(Utc::now())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create user alert: {}", e)))?;

        Ok(result)
    }

    /// Advance the end time of an active alert
    pub async fn extend(&self, alert_id: &Uuid, new_end_time: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_alerts
            SET end_time = $1
            WHERE id = $2 AND is_active
            "#,
        )
        .bind(new_end_time)
        .bind(alert_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to extend user alert: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::AlertNotFound(*alert_id).into());
        }
        Ok(())
    }

    /// Close an active alert, freezing its end time
    pub async fn close(&self, alert_id: &Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_alerts
            SET is_active = false
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(alert_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to close user alert: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::AlertNotFound(*alert_id).into());
        }
        Ok(())
    }

    /// List active, unsent alerts of a trigger type together with the setting
    /// fields the notification pass needs
    pub async fn list_pending_notification(
        &self,
        trigger_type: TriggerType,
    ) -> Result<Vec<PendingAlert>> {
        let result = sqlx::query_as::<_, PendingAlert>(
            r#"
            SELECT a.id AS alert_id, a.setting_id, s.camera_id, s.trigger_type,
                   s.name AS setting_name, a.start_time, a.end_time,
                   s.notify_email, s.notify_phone
            FROM user_alerts a
            JOIN alert_settings s ON s.id = a.setting_id
            WHERE a.is_active AND a.alert_sent_time IS NULL AND s.trigger_type = $1
            ORDER BY a.start_time
            "#,
        )
        .bind(trigger_type)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list pending alerts: {}", e)))?;

        Ok(result)
    }

    /// Stamp an alert as notified
    pub async fn mark_sent(&self, alert_id: &Uuid, sent_time: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_alerts
            SET alert_sent_time = $1
            WHERE id = $2
            "#,
        )
        .bind(sent_time)
        .bind(alert_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to mark alert sent: {}", e)))?;

        Ok(())
    }
}

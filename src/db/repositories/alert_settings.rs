use crate::db::models::alert_models::{AlertSetting, TriggerType};
use crate::error::Error;
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SETTING_COLUMNS: &str = r#"id, tenant_id, camera_id, name, enabled, trigger_type,
       object_types, roi, days_of_week, daily_start, daily_end, utc_offset_minutes,
       min_idle_duration_s, notify_email, notify_phone, created_at, updated_at"#;

/// Alert settings repository
#[derive(Clone)]
pub struct AlertSettingsRepository {
    pool: Arc<PgPool>,
}

impl AlertSettingsRepository {
    /// Create a new alert settings repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new alert setting
    pub async fn create(&self, setting: &AlertSetting) -> Result<AlertSetting> {
        info!(
            "Creating alert setting '{}' for camera {}",
            setting.name, setting.camera_id
        );

        let result = sqlx::query_as::<_, AlertSetting>(&format!(
            r#"
            INSERT INTO alert_settings (
                id, tenant_id, camera_id, name, enabled, trigger_type,
                object_types, roi, days_of_week, daily_start, daily_end, utc_offset_minutes,
                min_idle_duration_s, notify_email, notify_phone, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {SETTING_COLUMNS}
            "#
        ))
        .bind(setting.id)
        .bind(setting.tenant_id)
        .bind(setting.camera_id)
        .bind(&setting.name)
        .bind(setting.enabled)
        .bind(setting.trigger_type)
        .bind(&setting.object_types)
        .bind(&setting.roi)
        .bind(&setting.days_of_week)
        .bind(setting.daily_start)
        .bind(setting.daily_end)
        .bind(setting.utc_offset_minutes)
        .bind(setting.min_idle_duration_s)
        .bind(&setting.notify_email)
        .bind(&setting.notify_phone)
        .bind(setting.created_at)
        .bind(setting.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert setting: {}", e)))?;

        Ok(result)
    }

    /// Get setting by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<AlertSetting>> {
        let result = sqlx::query_as::<_, AlertSetting>(&format!(
            r#"
            SELECT {SETTING_COLUMNS}
            FROM alert_settings
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get alert setting by ID: {}", e)))?;

        Ok(result)
    }

    /// Update a setting
    pub async fn update(&self, setting: &AlertSetting) -> Result<AlertSetting> {
        let result = sqlx::query_as::<_, AlertSetting>(&format!(
            r#"
            UPDATE alert_settings
            SET name = $1, enabled = $2, object_types = $3, roi = $4, days_of_week = $5,
                daily_start = $6, daily_end = $7, utc_offset_minutes = $8,
                min_idle_duration_s = $9, notify_email = $10, notify_phone = $11, updated_at = $12
            WHERE id = $13
            RETURNING {SETTING_COLUMNS}
            "#
        ))
        .bind(&setting.name)
        .bind(setting.enabled)
        .bind(&setting.object_types)
        .bind(&setting.roi)
        .bind(&setting.days_of_week)
        .bind(setting.daily_start)
        .bind(setting.daily_end)
        .bind(setting.utc_offset_minutes)
        .bind(setting.min_idle_duration_s)
        .bind(&setting.notify_email)
        .bind(&setting.notify_phone)
        .bind(Utc::now())
        .bind(setting.id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update alert setting: {}", e)))?;

        Ok(result)
    }

    /// Delete a setting
    pub async fn delete(&self, id: &Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM alert_settings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete alert setting: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get all enabled settings of a trigger type
    pub async fn get_enabled_by_trigger(
        &self,
        trigger_type: TriggerType,
    ) -> Result<Vec<AlertSetting>> {
        let result = sqlx::query_as::<_, AlertSetting>(&format!(
            r#"
            SELECT {SETTING_COLUMNS}
            FROM alert_settings
            WHERE enabled = true AND trigger_type = $1
            "#
        ))
        .bind(trigger_type)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| {
            Error::Database(format!(
                "Failed to get enabled alert settings for {}: {}",
                trigger_type, e
            ))
        })?;

        Ok(result)
    }
}

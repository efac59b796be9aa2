use crate::db::models::alert_models::SharedClip;
use crate::error::Error;
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared clips repository
#[derive(Clone)]
pub struct SharedClipsRepository {
    pool: Arc<PgPool>,
}

impl SharedClipsRepository {
    /// Create a new shared clips repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a shareable clip record
    pub async fn create(&self, clip: &SharedClip) -> Result<SharedClip> {
        let result = sqlx::query_as::<_, SharedClip>(
            r#"
            INSERT INTO shared_clips (
                id, alert_id, camera_id, start_time, end_time, clip_url, share_token, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, alert_id, camera_id, start_time, end_time, clip_url, share_token, created_at
            "#,
        )
        .bind(clip.id)
        .bind(clip.alert_id)
        .bind(clip.camera_id)
        .bind(clip.start_time)
        .bind(clip.end_time)
        .bind(&clip.clip_url)
        .bind(clip.share_token)
        .bind(clip.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create shared clip: {}", e)))?;

        Ok(result)
    }

    /// Look up a clip by its share token
    pub async fn get_by_token(&self, share_token: &Uuid) -> Result<Option<SharedClip>> {
        let result = sqlx::query_as::<_, SharedClip>(
            r#"
            SELECT id, alert_id, camera_id, start_time, end_time, clip_url, share_token, created_at
            FROM shared_clips
            WHERE share_token = $1
            "#,
        )
        .bind(share_token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get shared clip: {}", e)))?;

        Ok(result)
    }
}

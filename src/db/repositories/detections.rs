use crate::db::models::detection_models::DetectionEvent;
use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Detections repository: the append-only detection store
#[derive(Clone)]
pub struct DetectionsRepository {
    pool: Arc<PgPool>,
}

impl DetectionsRepository {
    /// Create a new detections repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Ingest a batch of detection events. Rows matching an existing natural
    /// key are skipped, so replayed batches are harmless.
    pub async fn insert_batch(&self, detections: &[DetectionEvent]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut inserted = 0;
        for detection in detections {
            let result = sqlx::query(
                r#"
                INSERT INTO detections (
                    time, camera_id, object_type, x_min, y_min, x_max, y_max,
                    confidence, is_moving, track_id, perception_stack_start_id, object_index
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(detection.time)
            .bind(detection.camera_id)
            .bind(detection.object_type)
            .bind(detection.x_min)
            .bind(detection.y_min)
            .bind(detection.x_max)
            .bind(detection.y_max)
            .bind(detection.confidence)
            .bind(detection.is_moving)
            .bind(detection.track_id)
            .bind(&detection.perception_stack_start_id)
            .bind(detection.object_index)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert detection: {}", e)))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit detection batch: {}", e)))?;

        Ok(inserted)
    }

    /// Get all detections for a set of cameras in a time window, ordered by
    /// time. An empty camera list means every camera.
    pub async fn get_window(
        &self,
        cameras: &[Uuid],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<DetectionEvent>> {
        let result = if cameras.is_empty() {
            sqlx::query_as::<_, DetectionEvent>(
                r#"
                SELECT time, camera_id, object_type, x_min, y_min, x_max, y_max,
                       confidence, is_moving, track_id, perception_stack_start_id, object_index
                FROM detections
                WHERE time >= $1 AND time <= $2
                ORDER BY time
                "#,
            )
            .bind(start_time)
            .bind(end_time)
            .fetch_all(&*self.pool)
            .await
        } else {
            sqlx::query_as::<_, DetectionEvent>(
                r#"
                SELECT time, camera_id, object_type, x_min, y_min, x_max, y_max,
                       confidence, is_moving, track_id, perception_stack_start_id, object_index
                FROM detections
                WHERE camera_id = ANY($1) AND time >= $2 AND time <= $3
                ORDER BY time
                "#,
            )
            .bind(cameras)
            .bind(start_time)
            .bind(end_time)
            .fetch_all(&*self.pool)
            .await
        };

        result.map_err(|e| Error::Database(format!("Failed to get detection window: {}", e)).into())
    }

    /// Delete detections older than a specific date (retention sweep)
    pub async fn delete_older_than(&self, cutoff_date: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM detections
            WHERE time < $1
            "#,
        )
        .bind(cutoff_date)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete old detections: {}", e)))?;

        Ok(result.rows_affected())
    }
}

use crate::perception::category::{ObjectCategory, ObjectType};
use crate::perception::geometry::BoundingBox;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One detected object in one video frame. Append-only; rows are never
/// mutated after ingestion. (time, camera_id, object_index, track_id,
/// object_type) is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DetectionEvent {
    pub time: DateTime<Utc>,
    pub camera_id: Uuid,
    pub object_type: ObjectType,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub confidence: f32,
    pub is_moving: bool,
    /// Unique only within one perception stack epoch.
    pub track_id: i64,
    pub perception_stack_start_id: String,
    /// Per-frame unique index of the object within the frame.
    pub object_index: i32,
}

impl DetectionEvent {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.x_min, self.y_min, self.x_max, self.y_max)
    }

    pub fn category(&self) -> ObjectCategory {
        self.object_type.category()
    }

    pub fn track_key(&self) -> TrackKey {
        TrackKey {
            track_id: self.track_id,
            perception_stack_start_id: self.perception_stack_start_id.clone(),
        }
    }
}

/// Identity of a physical-object track. Track ids restart with every
/// perception stack epoch, so detections from different epochs must never be
/// merged into the same track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub track_id: i64,
    pub perception_stack_start_id: String,
}

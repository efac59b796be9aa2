use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Handle to a retrievable video clip.
#[derive(Debug, Clone)]
pub struct ClipHandle {
    pub url: String,
}

/// Clip retrieval boundary. The archive service owns the footage; this engine
/// only asks it for a playable clip covering an alert window.
#[async_trait]
pub trait ClipService: Send + Sync {
    /// Request or retrieve a clip for the camera and window. Fails with
    /// [`Error::ClipUnavailable`] when no footage covers the window.
    async fn request_clip(
        &self,
        camera_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<ClipHandle>;
}

/// Clip service backed by the archive's signed playback URLs.
pub struct ArchiveClipService {
    base_url: String,
}

impl ArchiveClipService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ClipService for ArchiveClipService {
    async fn request_clip(
        &self,
        camera_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<ClipHandle> {
        if end_time <= start_time {
            return Err(Error::ClipUnavailable(format!(
                "empty clip window for camera {}: {} .. {}",
                camera_id, start_time, end_time
            ))
            .into());
        }

        let url = format!(
            "{}/cameras/{}/clips?start={}&end={}",
            self.base_url.trim_end_matches('/'),
            camera_id,
            start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        Ok(ClipHandle { url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn builds_clip_url() {
        let service = ArchiveClipService::new("https://archive.example.com/");
        let camera = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        let end = start + chrono::Duration::seconds(30);

        let handle = service.request_clip(camera, start, end).await.unwrap();
        assert!(handle.url.starts_with("https://archive.example.com/cameras/"));
        assert!(handle.url.contains("start=2026-08-24T12:00:00Z"));
    }

    #[tokio::test]
    async fn empty_window_is_unavailable() {
        let service = ArchiveClipService::new("https://archive.example.com");
        let now = Utc::now();
        let result = service.request_clip(Uuid::new_v4(), now, now).await;
        assert!(result.is_err());
    }
}

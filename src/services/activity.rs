use crate::config::AggregationConfig;
use crate::db::models::detection_models::DetectionEvent;
use crate::db::repositories::DetectionsRepository;
use crate::perception::aggregate::{
    aggregate, aggregate_all, AggregatedInterval, AggregationParams, DetectionFilter,
};
use crate::perception::category::ObjectType;
use crate::perception::compose::{compose, count_events_over_time, EventInterval, TimeBucketCount};
use crate::perception::geometry::RegionFilter;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// One camera in an activity query together with its region of interest.
#[derive(Debug, Clone)]
pub struct CameraSource {
    pub camera_id: Uuid,
    pub region: RegionFilter,
}

impl CameraSource {
    pub fn whole_frame(camera_id: Uuid) -> Self {
        Self {
            camera_id,
            region: RegionFilter::All,
        }
    }
}

/// Parameters of a dashboard activity query.
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub sources: Vec<CameraSource>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub object_types: Option<HashSet<ObjectType>>,
    pub excluded_track_ids: HashSet<i64>,
    pub moving_only: bool,
}

impl ActivityQuery {
    pub fn new(sources: Vec<CameraSource>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            sources,
            start_time,
            end_time,
            object_types: None,
            excluded_track_ids: HashSet::new(),
            moving_only: false,
        }
    }
}

/// Read-model service for the dashboard: aggregated intervals, composed
/// activity events and bucketed counts, computed on demand from the
/// detection store.
#[derive(Clone)]
pub struct ActivityService {
    detections: DetectionsRepository,
    config: AggregationConfig,
}

impl ActivityService {
    /// Create a new activity service
    pub fn new(pool: Arc<PgPool>, config: AggregationConfig) -> Self {
        Self {
            detections: DetectionsRepository::new(pool),
            config,
        }
    }

    fn params(&self, query: &ActivityQuery) -> AggregationParams {
        let mut params = AggregationParams::from_config(&self.config);
        params.moving_only = query.moving_only;
        params
    }

    fn filter_for(&self, query: &ActivityQuery, source: &CameraSource) -> DetectionFilter {
        DetectionFilter {
            cameras: vec![source.camera_id],
            start_time: query.start_time,
            end_time: query.end_time,
            object_types: query.object_types.clone(),
            excluded_track_ids: query.excluded_track_ids.clone(),
            region: source.region.clone(),
        }
    }

    /// One fetch per query: every camera's detections over the window come
    /// from the same snapshot.
    async fn fetch(&self, query: &ActivityQuery) -> Result<Vec<DetectionEvent>> {
        let cameras: Vec<Uuid> = query.sources.iter().map(|s| s.camera_id).collect();
        self.detections
            .get_window(&cameras, query.start_time, query.end_time)
            .await
    }

    /// Aggregated intervals meeting the configured minimum event length
    pub async fn activity_intervals(&self, query: &ActivityQuery) -> Result<Vec<AggregatedInterval>> {
        let detections = self.fetch(query).await?;
        let params = self.params(query);

        let mut intervals = Vec::new();
        for source in &query.sources {
            intervals.extend(aggregate(&detections, &self.filter_for(query, source), &params));
        }
        intervals.sort_by(|a, b| {
            (a.category, a.start_time, a.camera_id).cmp(&(b.category, b.start_time, b.camera_id))
        });
        Ok(intervals)
    }

    /// Composed activity events for the query window
    pub async fn activity_events(&self, query: &ActivityQuery) -> Result<Vec<EventInterval>> {
        let detections = self.fetch(query).await?;
        let params = self.params(query);

        let mut intervals = Vec::new();
        for source in &query.sources {
            // keep sub-threshold connectors; the composer applies the
            // valid-event rule per group
            intervals.extend(aggregate_all(
                &detections,
                &self.filter_for(query, source),
                &params,
            ));
        }
        Ok(compose(
            &intervals,
            Duration::seconds(self.config.max_event_time_gap_s),
            params.min_event_length,
        ))
    }

    /// Number of activity events in the window
    pub async fn activity_count(&self, query: &ActivityQuery) -> Result<u64> {
        Ok(self.activity_events(query).await?.len() as u64)
    }

    /// Zero-filled activity counts per fixed-width bucket
    pub async fn activity_count_over_time(
        &self,
        query: &ActivityQuery,
        bucket_width: Duration,
    ) -> Result<Vec<TimeBucketCount>> {
        let events = self.activity_events(query).await?;
        Ok(count_events_over_time(
            &events,
            query.start_time,
            query.end_time,
            bucket_width,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use chrono::TimeZone;
    use sqlx::postgres::PgPoolOptions;

    // End-to-end test against a real database; set TEST_DATABASE_URL to run.
    #[tokio::test]
    async fn ingested_detections_show_up_as_activity() -> Result<()> {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping database test. Set TEST_DATABASE_URL to run.");
                return Ok(());
            }
        };

        let pool = Arc::new(PgPoolOptions::new().max_connections(2).connect(&url).await?);
        migrations::run_migrations(&pool).await?;

        let camera = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap();
        let detections: Vec<DetectionEvent> = (0..10)
            .map(|i| DetectionEvent {
                time: start + Duration::seconds(i),
                camera_id: camera,
                object_type: ObjectType::Person,
                x_min: 0.4,
                y_min: 0.4,
                x_max: 0.6,
                y_max: 0.6,
                confidence: 0.9,
                is_moving: true,
                track_id: 7,
                perception_stack_start_id: "epoch-test".to_string(),
                object_index: 0,
            })
            .collect();
        DetectionsRepository::new(pool.clone())
            .insert_batch(&detections)
            .await?;

        let service = ActivityService::new(pool, AggregationConfig::default());
        let query = ActivityQuery::new(
            vec![CameraSource::whole_frame(camera)],
            start - Duration::seconds(1),
            start + Duration::seconds(60),
        );
        let intervals = service.activity_intervals(&query).await?;
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].camera_id, camera);
        assert_eq!(service.activity_count(&query).await?, 1);
        Ok(())
    }
}

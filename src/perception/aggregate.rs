use crate::config::AggregationConfig;
use crate::db::models::detection_models::{DetectionEvent, TrackKey};
use crate::perception::category::{ObjectCategory, ObjectType};
use crate::perception::geometry::{Point, RegionFilter};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Tuning parameters for detection-to-interval aggregation.
#[derive(Debug, Clone)]
pub struct AggregationParams {
    /// Maximum gap between consecutive detections merged into one interval.
    pub aggregation_time_gap: Duration,
    /// Minimum duration for an interval to count as an event.
    pub min_event_length: Duration,
    /// Minimum confidence; 0 disables the filter.
    pub confidence_threshold: f32,
    /// Keep only moving detections.
    pub moving_only: bool,
    /// Detections on tracks younger than this need the higher confidence
    /// threshold below. Brief high-confidence tracks still count while
    /// low-confidence noise on short tracks is suppressed.
    pub short_event_length: Duration,
    pub short_event_confidence_threshold: f32,
}

impl AggregationParams {
    pub fn from_config(config: &AggregationConfig) -> Self {
        Self {
            aggregation_time_gap: Duration::seconds(config.aggregation_time_gap_s),
            min_event_length: Duration::seconds(config.min_event_length_s),
            confidence_threshold: config.confidence_threshold,
            moving_only: false,
            short_event_length: Duration::seconds(config.short_event_length_s),
            short_event_confidence_threshold: config.short_event_confidence_threshold,
        }
    }
}

/// Which detections a query considers before aggregation.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    /// Cameras to include; empty means every camera in the input.
    pub cameras: Vec<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Object classes to include; `None` means all classes.
    pub object_types: Option<HashSet<ObjectType>>,
    /// Tracks to ignore entirely (e.g. operator-dismissed false positives).
    pub excluded_track_ids: HashSet<i64>,
    pub region: RegionFilter,
}

impl DetectionFilter {
    pub fn new(cameras: Vec<Uuid>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            cameras,
            start_time,
            end_time,
            object_types: None,
            excluded_track_ids: HashSet::new(),
            region: RegionFilter::All,
        }
    }
}

/// A run of nearby same-category detections on one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedInterval {
    pub camera_id: Uuid,
    pub category: ObjectCategory,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl AggregatedInterval {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Per-detection context derived from its track: the earliest in-track time
/// and the bounding-box anchor 5 detections earlier (None during cold start).
struct TrackContext {
    first_time: DateTime<Utc>,
    prior_anchor: Option<Point>,
}

fn track_contexts(detections: &[&DetectionEvent]) -> HashMap<usize, TrackContext> {
    let mut by_track: HashMap<TrackKey, Vec<usize>> = HashMap::new();
    for (idx, detection) in detections.iter().enumerate() {
        by_track.entry(detection.track_key()).or_default().push(idx);
    }

    let mut contexts = HashMap::with_capacity(detections.len());
    for indices in by_track.values_mut() {
        indices.sort_by_key(|&i| (detections[i].time, detections[i].object_index));
        let first_time = detections[indices[0]].time;
        for (pos, &idx) in indices.iter().enumerate() {
            let prior_anchor = if pos >= 5 {
                Some(detections[indices[pos - 5]].bounding_box().anchor())
            } else {
                None
            };
            contexts.insert(
                idx,
                TrackContext {
                    first_time,
                    prior_anchor,
                },
            );
        }
    }
    contexts
}

/// Apply every per-detection filter: camera set, time range, object classes,
/// excluded tracks, confidence, movement, geometry, and the short-track
/// secondary confidence gate.
pub fn filter_detections<'a>(
    detections: &'a [DetectionEvent],
    filter: &DetectionFilter,
    params: &AggregationParams,
) -> Vec<&'a DetectionEvent> {
    let camera_set: Option<HashSet<Uuid>> = if filter.cameras.is_empty() {
        None
    } else {
        Some(filter.cameras.iter().copied().collect())
    };

    let candidates: Vec<&DetectionEvent> = detections
        .iter()
        .filter(|d| camera_set.as_ref().map_or(true, |set| set.contains(&d.camera_id)))
        .filter(|d| d.time >= filter.start_time && d.time <= filter.end_time)
        .filter(|d| {
            filter
                .object_types
                .as_ref()
                .map_or(true, |types| types.contains(&d.object_type))
        })
        .filter(|d| !filter.excluded_track_ids.contains(&d.track_id))
        .collect();

    // Track context comes from the camera/time/class-filtered stream so the
    // line-crossing lag and track ages are not distorted by the confidence
    // and geometry filters below.
    let contexts = track_contexts(&candidates);

    candidates
        .iter()
        .enumerate()
        .filter(|(idx, d)| {
            if params.confidence_threshold > 0.0 && d.confidence < params.confidence_threshold {
                return false;
            }
            if params.moving_only && !d.is_moving {
                return false;
            }
            let context = &contexts[idx];
            if !filter.region.matches(&d.bounding_box(), context.prior_anchor) {
                return false;
            }
            let track_age = d.time - context.first_time;
            if track_age < params.short_event_length
                && d.confidence < params.short_event_confidence_threshold
            {
                return false;
            }
            true
        })
        .map(|(_, d)| *d)
        .collect()
}

/// Aggregate detections into intervals, keeping every interval regardless of
/// its duration. The event composer needs the sub-threshold connectors.
pub fn aggregate_all(
    detections: &[DetectionEvent],
    filter: &DetectionFilter,
    params: &AggregationParams,
) -> Vec<AggregatedInterval> {
    let surviving = filter_detections(detections, filter, params);

    let mut partitions: HashMap<(ObjectCategory, Uuid), Vec<DateTime<Utc>>> = HashMap::new();
    for detection in surviving {
        partitions
            .entry((detection.category(), detection.camera_id))
            .or_default()
            .push(detection.time);
    }

    let mut intervals = Vec::new();
    for ((category, camera_id), mut times) in partitions {
        times.sort();
        let mut group_start = times[0];
        let mut group_end = times[0];
        for &time in &times[1..] {
            if time - group_end > params.aggregation_time_gap {
                intervals.push(AggregatedInterval {
                    camera_id,
                    category,
                    start_time: group_start,
                    end_time: group_end,
                });
                group_start = time;
            }
            group_end = time;
        }
        intervals.push(AggregatedInterval {
            camera_id,
            category,
            start_time: group_start,
            end_time: group_end,
        });
    }

    // Deterministic ordering: category sorts by name, so the global order is
    // not chronological across categories. Callers re-sort if they need time
    // order.
    intervals.sort_by(|a, b| {
        (a.category, a.start_time, a.camera_id).cmp(&(b.category, b.start_time, b.camera_id))
    });
    intervals
}

/// Aggregate detections into intervals at least `min_event_length` long.
pub fn aggregate(
    detections: &[DetectionEvent],
    filter: &DetectionFilter,
    params: &AggregationParams,
) -> Vec<AggregatedInterval> {
    let mut intervals = aggregate_all(detections, filter, params);
    intervals.retain(|interval| interval.duration() >= params.min_event_length);
    intervals
}

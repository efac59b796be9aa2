use crate::perception::aggregate::AggregatedInterval;
use crate::perception::category::ObjectCategory;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// A dashboard-level activity event: aggregated intervals merged across a
/// coarser time gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventInterval {
    pub camera_id: Uuid,
    pub category: ObjectCategory,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Zero-filled per-bucket event count for "activity over time" charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucketCount {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
}

/// Merge aggregated intervals into activity events. Intervals separated by at
/// most `max_event_time_gap` merge into one event; an event is kept only when
/// at least one constituent interval individually lasted `min_event_length`,
/// so long events absorb short connector intervals but groups made up
/// entirely of sub-threshold intervals are suppressed.
pub fn compose(
    intervals: &[AggregatedInterval],
    max_event_time_gap: Duration,
    min_event_length: Duration,
) -> Vec<EventInterval> {
    let mut partitions: HashMap<(ObjectCategory, Uuid), Vec<&AggregatedInterval>> = HashMap::new();
    for interval in intervals {
        partitions
            .entry((interval.category, interval.camera_id))
            .or_default()
            .push(interval);
    }

    let mut events = Vec::new();
    for ((category, camera_id), mut members) in partitions {
        members.sort_by_key(|interval| interval.start_time);

        let mut group: Vec<&AggregatedInterval> = Vec::new();
        let mut flush = |group: &mut Vec<&AggregatedInterval>, events: &mut Vec<EventInterval>| {
            let valid = group
                .iter()
                .any(|interval| interval.duration() >= min_event_length);
            if valid {
                if let (Some(start_time), Some(end_time)) = (
                    group.iter().map(|i| i.start_time).min(),
                    group.iter().map(|i| i.end_time).max(),
                ) {
                    events.push(EventInterval {
                        camera_id,
                        category,
                        start_time,
                        end_time,
                    });
                }
            }
            group.clear();
        };

        for interval in members {
            if let Some(last) = group.last() {
                if interval.start_time - last.end_time > max_event_time_gap {
                    flush(&mut group, &mut events);
                }
            }
            group.push(interval);
        }
        flush(&mut group, &mut events);
    }

    events.sort_by(|a, b| {
        (a.category, a.start_time, a.camera_id).cmp(&(b.category, b.start_time, b.camera_id))
    });
    events
}

/// Number of activity events in the composed set.
pub fn count_events(
    intervals: &[AggregatedInterval],
    max_event_time_gap: Duration,
    min_event_length: Duration,
) -> u64 {
    compose(intervals, max_event_time_gap, min_event_length).len() as u64
}

/// Count composed events per fixed-width bucket over [range_start,
/// range_end), zero-filling buckets without activity. Events are assigned to
/// the bucket containing their start time.
pub fn count_events_over_time(
    events: &[EventInterval],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    bucket_width: Duration,
) -> Vec<TimeBucketCount> {
    if bucket_width <= Duration::zero() || range_end <= range_start {
        return Vec::new();
    }

    let mut buckets = Vec::new();
    let mut bucket_start = range_start;
    while bucket_start < range_end {
        buckets.push(TimeBucketCount {
            bucket_start,
            count: 0,
        });
        bucket_start += bucket_width;
    }

    for event in events {
        if event.start_time < range_start || event.start_time >= range_end {
            continue;
        }
        let offset = (event.start_time - range_start).num_milliseconds()
            / bucket_width.num_milliseconds();
        buckets[offset as usize].count += 1;
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn interval(
        camera_id: Uuid,
        category: ObjectCategory,
        start_s: i64,
        end_s: i64,
    ) -> AggregatedInterval {
        AggregatedInterval {
            camera_id,
            category,
            start_time: t(start_s),
            end_time: t(end_s),
        }
    }

    #[test]
    fn long_event_absorbs_short_connectors() {
        let camera = Uuid::new_v4();
        let intervals = vec![
            interval(camera, ObjectCategory::Person, 0, 120),
            // one-second connector 30s later
            interval(camera, ObjectCategory::Person, 150, 151),
            interval(camera, ObjectCategory::Person, 200, 320),
        ];
        let events = compose(&intervals, Duration::seconds(60), Duration::seconds(10));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_time, t(0));
        assert_eq!(events[0].end_time, t(320));
    }

    #[test]
    fn all_short_group_is_suppressed() {
        let camera = Uuid::new_v4();
        let intervals = vec![
            interval(camera, ObjectCategory::Person, 0, 1),
            interval(camera, ObjectCategory::Person, 30, 32),
        ];
        let events = compose(&intervals, Duration::seconds(60), Duration::seconds(10));
        assert!(events.is_empty());
    }

    #[test]
    fn gap_beyond_threshold_starts_new_event() {
        let camera = Uuid::new_v4();
        let intervals = vec![
            interval(camera, ObjectCategory::Vehicle, 0, 60),
            interval(camera, ObjectCategory::Vehicle, 200, 260),
        ];
        let events = compose(&intervals, Duration::seconds(100), Duration::seconds(10));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn categories_and_cameras_do_not_merge() {
        let camera_a = Uuid::new_v4();
        let camera_b = Uuid::new_v4();
        let intervals = vec![
            interval(camera_a, ObjectCategory::Person, 0, 60),
            interval(camera_a, ObjectCategory::Vehicle, 10, 70),
            interval(camera_b, ObjectCategory::Person, 20, 80),
        ];
        let events = compose(&intervals, Duration::seconds(300), Duration::seconds(10));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn buckets_are_zero_filled() {
        let camera = Uuid::new_v4();
        let events = vec![
            EventInterval {
                camera_id: camera,
                category: ObjectCategory::Person,
                start_time: t(30),
                end_time: t(90),
            },
            EventInterval {
                camera_id: camera,
                category: ObjectCategory::Person,
                start_time: t(45),
                end_time: t(100),
            },
        ];
        let counts = count_events_over_time(&events, t(0), t(300), Duration::seconds(60));
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[0].count, 2);
        assert!(counts[1..].iter().all(|bucket| bucket.count == 0));
        assert_eq!(counts[4].bucket_start, t(240));
    }

    #[test]
    fn events_outside_range_are_not_counted() {
        let camera = Uuid::new_v4();
        let events = vec![EventInterval {
            camera_id: camera,
            category: ObjectCategory::Person,
            start_time: t(-10),
            end_time: t(20),
        }];
        let counts = count_events_over_time(&events, t(0), t(120), Duration::seconds(60));
        assert!(counts.iter().all(|bucket| bucket.count == 0));
    }
}

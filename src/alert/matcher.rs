use crate::config::{AggregationConfig, AlertingConfig};
use crate::db::models::alert_models::{AlertSetting, TriggerType, UserAlert};
use crate::db::models::detection_models::{DetectionEvent, TrackKey};
use crate::db::repositories::{
    AlertRunsRepository, AlertSettingsRepository, DetectionsRepository, UserAlertsRepository,
};
use crate::error::Error;
use crate::messaging::broker::EventSink;
use crate::messaging::event::{EventMessage, EventType};
use crate::perception::aggregate::{filter_detections, AggregationParams, DetectionFilter};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A time span of qualifying activity for one alert setting in one cycle.
pub type QualifyingInterval = (DateTime<Utc>, DateTime<Utc>);

/// What one matching cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub settings_checked: usize,
    pub opened: usize,
    pub extended: usize,
    pub closed: usize,
    pub reopened: usize,
    pub skipped: usize,
}

/// State transition decided for one alert setting in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertAction {
    Open {
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    Extend {
        alert_id: Uuid,
        new_end_time: DateTime<Utc>,
    },
    CloseAndReopen {
        alert_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    },
    Close {
        alert_id: Uuid,
    },
    Leave,
}

/// Re-entrancy guard: a cycle may not run again for a trigger type until
/// `min_interval` has elapsed since the previous successful run.
pub fn check_cadence(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> Result<(), Error> {
    if let Some(last) = last_run {
        let since = now - last;
        if since < min_interval {
            return Err(Error::TooSoon {
                seconds_since_last_run: since.num_seconds(),
                min_interval_s: min_interval.num_seconds(),
            });
        }
    }
    Ok(())
}

/// How far beyond the nominal window this cycle must look back.
///
/// Do-not-enter covers exactly the time since the previous run, clamped to
/// `alert_check_max_interval` when the previous run is stale or missing; the
/// clamp undercounts the skipped period, which is accepted behavior the
/// trigger thresholds were tuned against. Idling always uses twice the check
/// interval.
pub fn extra_query_time(
    trigger_type: TriggerType,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &AlertingConfig,
) -> Duration {
    match trigger_type {
        TriggerType::Idling => config.idle_alert_check_interval() * 2,
        TriggerType::DoNotEnter => {
            let max = config.alert_check_max_interval();
            match last_run {
                Some(last) if now - last <= max => now - last,
                Some(last) => {
                    warn!(
                        "Last {} run at {} is older than the maximum query window; clamping to {}s",
                        trigger_type,
                        last,
                        max.num_seconds()
                    );
                    max
                }
                None => {
                    warn!(
                        "No previous {} run recorded; clamping query window to {}s",
                        trigger_type,
                        max.num_seconds()
                    );
                    max
                }
            }
        }
    }
}

/// Idling qualification: group the setting's surviving detections by track,
/// then require that every detection in the group is recent enough
/// (within `min_idle + extra` of now), that the track was observed without
/// interruption (max gap < extra/2), and that it lingered for at least
/// `min_idle`. Qualifying tracks merge into one interval per setting.
pub fn qualify_idling(
    detections: &[&DetectionEvent],
    min_idle: Duration,
    now: DateTime<Utc>,
    extra: Duration,
) -> Option<QualifyingInterval> {
    let oldest_allowed = now - (min_idle + extra);
    let max_gap = extra / 2;

    let mut by_track: HashMap<TrackKey, Vec<DateTime<Utc>>> = HashMap::new();
    for detection in detections {
        by_track
            .entry(detection.track_key())
            .or_default()
            .push(detection.time);
    }

    let mut qualifying: Option<QualifyingInterval> = None;
    for (_, mut times) in by_track {
        times.sort();
        let (first, last) = match (times.first(), times.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => continue,
        };

        if first < oldest_allowed {
            // strict idle-age test: every detection must be recent
            continue;
        }
        if times.windows(2).any(|w| w[1] - w[0] >= max_gap) {
            continue;
        }
        if last - first < min_idle {
            continue;
        }

        qualifying = Some(match qualifying {
            Some((start, end)) => (start.min(first), end.max(last)),
            None => (first, last),
        });
    }
    qualifying
}

/// Do-not-enter qualification: enough detections, enough of them moving,
/// over the setting's whole surviving window (not per track).
pub fn qualify_do_not_enter(
    detections: &[&DetectionEvent],
    min_num_detections: usize,
    min_num_moving_detections: usize,
) -> Option<QualifyingInterval> {
    if detections.len() < min_num_detections {
        return None;
    }
    let moving = detections.iter().filter(|d| d.is_moving).count();
    if moving < min_num_moving_detections {
        return None;
    }
    let start = detections.iter().map(|d| d.time).min()?;
    let end = detections.iter().map(|d| d.time).max()?;
    Some((start, end))
}

/// Maximum time an alert for this setting may stay active before it is
/// closed (and reopened, when activity continues).
pub fn max_active_duration(setting: &AlertSetting, config: &AlertingConfig) -> Duration {
    match setting.trigger_type {
        TriggerType::Idling => config.idle_alert_max_duration() + setting.min_idle_duration(),
        TriggerType::DoNotEnter => config.do_not_enter_alert_max_duration(),
    }
}

/// The open/extend/close decision for one setting, given the current active
/// alert (if any) and this cycle's qualifying interval (if any).
pub fn plan_transition(
    active: Option<&UserAlert>,
    qualifying: Option<QualifyingInterval>,
    now: DateTime<Utc>,
    max_active: Duration,
) -> AlertAction {
    match (active, qualifying) {
        (Some(alert), Some((start_time, end_time))) => {
            if alert.active_duration(now) < max_active {
                AlertAction::Extend {
                    alert_id: alert.id,
                    new_end_time: end_time,
                }
            } else {
                AlertAction::CloseAndReopen {
                    alert_id: alert.id,
                    start_time,
                    end_time,
                }
            }
        }
        (None, Some((start_time, end_time))) => AlertAction::Open {
            start_time,
            end_time,
        },
        (Some(alert), None) => {
            if alert.active_duration(now) >= max_active {
                AlertAction::Close { alert_id: alert.id }
            } else {
                // within grace, nothing to extend with
                AlertAction::Leave
            }
        }
        (None, None) => AlertAction::Leave,
    }
}

/// Evaluates alert settings against the detection stream on a polling
/// cadence and evolves per-setting alert state.
pub struct AlertMatcher {
    detections: DetectionsRepository,
    settings: AlertSettingsRepository,
    alerts: UserAlertsRepository,
    runs: AlertRunsRepository,
    sink: Arc<dyn EventSink>,
    alerting: AlertingConfig,
    aggregation: AggregationConfig,
}

impl AlertMatcher {
    /// Create a new alert matcher
    pub fn new(
        pool: Arc<PgPool>,
        sink: Arc<dyn EventSink>,
        alerting: AlertingConfig,
        aggregation: AggregationConfig,
    ) -> Self {
        Self {
            detections: DetectionsRepository::new(pool.clone()),
            settings: AlertSettingsRepository::new(pool.clone()),
            alerts: UserAlertsRepository::new(pool.clone()),
            runs: AlertRunsRepository::new(pool),
            sink,
            alerting,
            aggregation,
        }
    }

    /// Run one matching cycle for a trigger type. The last-run watermark is
    /// advanced only when the cycle completes, so a failed cycle is retried
    /// rather than skipped. Fails with [`Error::TooSoon`] when invoked below
    /// the minimum cadence.
    pub async fn match_user_alerts(
        &self,
        trigger_type: TriggerType,
        now: DateTime<Utc>,
    ) -> Result<MatchSummary> {
        let last_run = self.runs.get_last_run(trigger_type).await?;
        check_cadence(last_run, now, self.alerting.alert_check_min_interval())?;

        let settings: Vec<AlertSetting> = self
            .settings
            .get_enabled_by_trigger(trigger_type)
            .await?
            .into_iter()
            .filter(|setting| setting.is_activated(now))
            .collect();

        if settings.is_empty() {
            self.runs.set_last_run(trigger_type, now).await?;
            return Ok(MatchSummary::default());
        }

        let extra = extra_query_time(trigger_type, last_run, now, &self.alerting);
        let window_start = match trigger_type {
            TriggerType::Idling => {
                let max_idle = settings
                    .iter()
                    .map(|s| s.min_idle_duration())
                    .max()
                    .unwrap_or_else(Duration::zero);
                now - (max_idle + extra)
            }
            TriggerType::DoNotEnter => now - extra,
        };

        // One snapshot of the window for every setting in this cycle.
        let cameras: Vec<Uuid> = {
            let mut set = HashSet::new();
            settings
                .iter()
                .map(|s| s.camera_id)
                .filter(|c| set.insert(*c))
                .collect()
        };
        let detections = self.detections.get_window(&cameras, window_start, now).await?;

        let params = AggregationParams::from_config(&self.aggregation);
        let mut summary = MatchSummary {
            settings_checked: settings.len(),
            ..MatchSummary::default()
        };

        for setting in &settings {
            let region = match setting.region_filter(self.aggregation.intersection_ratio_threshold) {
                Ok(region) => region,
                Err(e) => {
                    error!("Skipping alert setting {} ({}): {}", setting.id, setting.name, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let filter = DetectionFilter {
                cameras: vec![setting.camera_id],
                start_time: window_start,
                end_time: now,
                object_types: if setting.object_types.0.is_empty() {
                    None
                } else {
                    Some(setting.object_types.0.iter().copied().collect())
                },
                excluded_track_ids: HashSet::new(),
                region,
            };
            let surviving = filter_detections(&detections, &filter, &params);

            let qualifying = match trigger_type {
                TriggerType::Idling => {
                    qualify_idling(&surviving, setting.min_idle_duration(), now, extra)
                }
                TriggerType::DoNotEnter => qualify_do_not_enter(
                    &surviving,
                    self.alerting.min_num_detections,
                    self.alerting.min_num_moving_detections,
                ),
            };

            let active = self.alerts.get_active_for_setting(&setting.id).await?;
            let action = plan_transition(
                active.as_ref(),
                qualifying,
                now,
                max_active_duration(setting, &self.alerting),
            );

            if let Err(e) = self.apply_action(setting, &action, &mut summary).await {
                if e.downcast_ref::<Error>().is_some_and(Error::is_per_alert) {
                    // inconsistent state for one setting; skip it, the next
                    // cycle sees fresh state
                    error!(
                        "Alert transition for setting {} failed, skipping: {}",
                        setting.id, e
                    );
                    summary.skipped += 1;
                } else {
                    return Err(e);
                }
            }
        }

        self.runs.set_last_run(trigger_type, now).await?;
        info!(
            "Alert matching cycle for {} complete: {} settings, {} opened, {} extended, {} closed, {} reopened",
            trigger_type,
            summary.settings_checked,
            summary.opened,
            summary.extended,
            summary.closed,
            summary.reopened
        );
        Ok(summary)
    }

    async fn apply_action(
        &self,
        setting: &AlertSetting,
        action: &AlertAction,
        summary: &mut MatchSummary,
    ) -> Result<()> {
        match action {
            AlertAction::Open {
                start_time,
                end_time,
            } => {
                let alert = self.alerts.create(&setting.id, *start_time, *end_time).await?;
                summary.opened += 1;
                self.publish(EventType::AlertOpened, setting, &alert.id).await;
            }
            AlertAction::Extend {
                alert_id,
                new_end_time,
            } => {
                self.alerts.extend(alert_id, *new_end_time).await?;
                summary.extended += 1;
                self.publish(EventType::AlertExtended, setting, alert_id).await;
            }
            AlertAction::CloseAndReopen {
                alert_id,
                start_time,
                end_time,
            } => {
                self.alerts.close(alert_id).await?;
                summary.closed += 1;
                self.publish(EventType::AlertClosed, setting, alert_id).await;

                let alert = self.alerts.create(&setting.id, *start_time, *end_time).await?;
                summary.reopened += 1;
                self.publish(EventType::AlertReopened, setting, &alert.id).await;
            }
            AlertAction::Close { alert_id } => {
                self.alerts.close(alert_id).await?;
                summary.closed += 1;
                self.publish(EventType::AlertClosed, setting, alert_id).await;
            }
            AlertAction::Leave => {}
        }
        Ok(())
    }

    /// Lifecycle events are best effort; a broker hiccup must not fail the
    /// cycle.
    async fn publish(&self, event_type: EventType, setting: &AlertSetting, alert_id: &Uuid) {
        let event = EventMessage::new(
            event_type,
            Some(setting.id),
            serde_json::json!({
                "alert_id": alert_id,
                "camera_id": setting.camera_id,
                "tenant_id": setting.tenant_id,
                "trigger_type": setting.trigger_type,
            }),
        );
        match event {
            Ok(event) => {
                if let Err(e) = self.sink.publish_event(event).await {
                    warn!("Failed to publish alert lifecycle event: {}", e);
                }
            }
            Err(e) => warn!("Failed to build alert lifecycle event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::aggregate::test_support::detection;
    use crate::perception::category::ObjectType;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    fn alert(start_s_ago: i64) -> UserAlert {
        UserAlert {
            id: Uuid::new_v4(),
            setting_id: Uuid::new_v4(),
            start_time: now() - Duration::seconds(start_s_ago),
            end_time: now() - Duration::seconds(start_s_ago / 2),
            is_active: true,
            alert_sent_time: None,
            created_at: now() - Duration::seconds(start_s_ago),
        }
    }

    #[test]
    fn cadence_guard_trips_below_minimum() {
        let result = check_cadence(
            Some(now() - Duration::seconds(10)),
            now(),
            Duration::seconds(30),
        );
        assert!(matches!(result, Err(Error::TooSoon { .. })));

        assert!(check_cadence(
            Some(now() - Duration::seconds(40)),
            now(),
            Duration::seconds(30)
        )
        .is_ok());
        assert!(check_cadence(None, now(), Duration::seconds(30)).is_ok());
    }

    #[test]
    fn do_not_enter_window_tracks_time_since_last_run() {
        let config = AlertingConfig::default();
        let extra = extra_query_time(
            TriggerType::DoNotEnter,
            Some(now() - Duration::seconds(120)),
            now(),
            &config,
        );
        assert_eq!(extra, Duration::seconds(120));
    }

    #[test]
    fn do_not_enter_window_is_clamped_when_stale_or_missing() {
        let config = AlertingConfig::default();
        let clamp = config.alert_check_max_interval();

        let stale = extra_query_time(
            TriggerType::DoNotEnter,
            Some(now() - Duration::seconds(5000)),
            now(),
            &config,
        );
        assert_eq!(stale, clamp);

        let missing = extra_query_time(TriggerType::DoNotEnter, None, now(), &config);
        assert_eq!(missing, clamp);
    }

    #[test]
    fn idling_window_is_fixed() {
        let config = AlertingConfig::default();
        let extra = extra_query_time(TriggerType::Idling, None, now(), &config);
        assert_eq!(extra, config.idle_alert_check_interval() * 2);
    }

    fn idle_track(spacing_s: i64, count: i64) -> Vec<DetectionEvent> {
        let camera = Uuid::new_v4();
        (0..count)
            .map(|i| {
                detection(
                    camera,
                    ObjectType::Truck,
                    now() - Duration::seconds((count - 1 - i) * spacing_s),
                    42,
                )
            })
            .collect()
    }

    #[test]
    fn idling_rejects_tracks_with_stale_detections() {
        // 70s spacing over 6 detections reaches 350s back, beyond the
        // min_idle + extra = 210s idle window, even though every gap stays
        // below extra/2 and the span exceeds min_idle
        let detections = idle_track(70, 6);
        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        let qualifying = qualify_idling(
            &refs,
            Duration::seconds(60),
            now(),
            Duration::seconds(150),
        );
        assert_eq!(qualifying, None);
    }

    #[test]
    fn idling_accepts_fresh_dense_track() {
        // 10s spacing spanning the full minimum, all well within the idle
        // window
        let detections = idle_track(10, 7);
        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        let qualifying = qualify_idling(
            &refs,
            Duration::seconds(60),
            now(),
            Duration::seconds(150),
        );
        let (start, end) = qualifying.expect("track should qualify");
        assert_eq!(end - start, Duration::seconds(60));
        assert_eq!(end, now());
    }

    #[test]
    fn idling_rejects_interrupted_track() {
        // one 80s gap >= extra/2 = 75s breaks the continuity requirement
        let camera = Uuid::new_v4();
        let mut detections = vec![
            detection(camera, ObjectType::Truck, now() - Duration::seconds(140), 42),
            detection(camera, ObjectType::Truck, now() - Duration::seconds(130), 42),
        ];
        detections.push(detection(camera, ObjectType::Truck, now() - Duration::seconds(50), 42));
        detections.push(detection(camera, ObjectType::Truck, now(), 42));
        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        assert_eq!(
            qualify_idling(&refs, Duration::seconds(60), now(), Duration::seconds(150)),
            None
        );
    }

    #[test]
    fn idling_rejects_short_lingering() {
        // fresh and dense but spans only 40s < min_idle
        let detections = idle_track(10, 5);
        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        assert_eq!(
            qualify_idling(&refs, Duration::seconds(60), now(), Duration::seconds(150)),
            None
        );
    }

    #[test]
    fn do_not_enter_requires_both_thresholds() {
        let camera = Uuid::new_v4();
        let mut detections: Vec<DetectionEvent> = (0..3)
            .map(|i| detection(camera, ObjectType::Person, now() - Duration::seconds(i * 10), i))
            .collect();
        detections[0].is_moving = false;
        detections[1].is_moving = false;

        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        // 3 detections but only 1 moving
        assert_eq!(qualify_do_not_enter(&refs, 3, 2), None);

        detections[1].is_moving = true;
        let refs: Vec<&DetectionEvent> = detections.iter().collect();
        let (start, end) = qualify_do_not_enter(&refs, 3, 2).expect("should trigger");
        assert_eq!(start, now() - Duration::seconds(20));
        assert_eq!(end, now());
    }

    #[test]
    fn transition_opens_when_idle() {
        let action = plan_transition(
            None,
            Some((now() - Duration::seconds(90), now())),
            now(),
            Duration::seconds(600),
        );
        assert!(matches!(action, AlertAction::Open { .. }));
    }

    #[test]
    fn transition_extends_within_max_duration() {
        let active = alert(100);
        let action = plan_transition(
            Some(&active),
            Some((now() - Duration::seconds(90), now())),
            now(),
            Duration::seconds(600),
        );
        assert_eq!(
            action,
            AlertAction::Extend {
                alert_id: active.id,
                new_end_time: now(),
            }
        );
    }

    #[test]
    fn transition_rolls_over_past_max_duration() {
        let active = alert(700);
        let action = plan_transition(
            Some(&active),
            Some((now() - Duration::seconds(90), now())),
            now(),
            Duration::seconds(600),
        );
        assert!(matches!(action, AlertAction::CloseAndReopen { alert_id, .. } if alert_id == active.id));
    }

    #[test]
    fn transition_closes_stale_alert_without_new_activity() {
        let active = alert(700);
        let action = plan_transition(Some(&active), None, now(), Duration::seconds(600));
        assert_eq!(action, AlertAction::Close { alert_id: active.id });
    }

    #[test]
    fn transition_leaves_recent_alert_without_new_activity() {
        let active = alert(100);
        let action = plan_transition(Some(&active), None, now(), Duration::seconds(600));
        assert_eq!(action, AlertAction::Leave);
    }

    /// Replay arbitrary cycles against an in-memory alert slot; the planner
    /// must never produce a second active alert for one setting.
    #[test]
    fn at_most_one_active_alert_over_any_cycle_sequence() {
        let max_active = Duration::seconds(300);
        let mut active: Option<UserAlert> = None;
        let mut closed_count = 0usize;

        // cycles with (true) and without (false) qualifying activity, one
        // per minute; long enough to force extend, roll-over, close and
        // reopen along the way
        let qualifying_by_cycle = [
            true, true, false, true, true, false, false, true, false, true,
        ];

        for (cycle, has_activity) in qualifying_by_cycle.iter().enumerate() {
            let cycle_now = now() + Duration::seconds(cycle as i64 * 60);
            let qualifying =
                has_activity.then(|| (cycle_now - Duration::seconds(90), cycle_now));
            let action = plan_transition(active.as_ref(), qualifying, cycle_now, max_active);

            match action {
                AlertAction::Open {
                    start_time,
                    end_time,
                } => {
                    assert!(active.is_none(), "open with an alert already active");
                    active = Some(UserAlert {
                        id: Uuid::new_v4(),
                        setting_id: Uuid::new_v4(),
                        start_time,
                        end_time,
                        is_active: true,
                        alert_sent_time: None,
                        created_at: cycle_now,
                    });
                }
                AlertAction::Extend { new_end_time, .. } => {
                    active.as_mut().expect("extend without active alert").end_time = new_end_time;
                }
                AlertAction::CloseAndReopen {
                    start_time,
                    end_time,
                    ..
                } => {
                    assert!(active.is_some());
                    closed_count += 1;
                    active = Some(UserAlert {
                        id: Uuid::new_v4(),
                        setting_id: Uuid::new_v4(),
                        start_time,
                        end_time,
                        is_active: true,
                        alert_sent_time: None,
                        created_at: cycle_now,
                    });
                }
                AlertAction::Close { .. } => {
                    assert!(active.is_some());
                    closed_count += 1;
                    active = None;
                }
                AlertAction::Leave => {}
            }
        }

        // the sequence forces one roll-over and one timeout close, and ends
        // with a freshly opened alert
        assert_eq!(closed_count, 2);
        assert!(active.is_some());
    }
}

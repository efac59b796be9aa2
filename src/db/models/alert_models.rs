use crate::perception::category::ObjectType;
use crate::perception::geometry::{Point, RegionFilter};
use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// What condition an alert setting watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "snake_case")]
pub enum TriggerType {
    DoNotEnter,
    Idling,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::DoNotEnter => "do_not_enter",
            TriggerType::Idling => "idling",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-configured alert rule. Read-only input to every matching cycle.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertSetting {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub camera_id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub trigger_type: TriggerType,
    /// Object classes of interest; empty means all classes.
    pub object_types: Json<Vec<ObjectType>>,
    /// ROI polygon in normalized coordinates; empty means the whole frame.
    pub roi: Json<Vec<Point>>,
    /// Enabled days, 0 = Monday .. 6 = Sunday, in the setting's local time.
    pub days_of_week: Json<Vec<i16>>,
    /// Optional daily activation window in the setting's local time. A window
    /// with end < start wraps around midnight.
    pub daily_start: Option<NaiveTime>,
    pub daily_end: Option<NaiveTime>,
    /// Fixed UTC offset of the setting's local time, in minutes.
    pub utc_offset_minutes: i32,
    /// Idling only: seconds an object must linger before triggering.
    pub min_idle_duration_s: Option<i64>,
    pub notify_email: Option<String>,
    pub notify_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertSetting {
    /// Whether this setting is live at `now`: enabled day of week and, when a
    /// daily window is configured, local time inside the window.
    pub fn is_activated(&self, now: DateTime<Utc>) -> bool {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        let local = now.with_timezone(&offset);

        let weekday = local.weekday().num_days_from_monday() as i16;
        if !self.days_of_week.0.contains(&weekday) {
            return false;
        }

        match (self.daily_start, self.daily_end) {
            (Some(start), Some(end)) => {
                let t = local.time();
                if end < start {
                    // window wraps around midnight
                    t >= start || t <= end
                } else {
                    t >= start && t <= end
                }
            }
            _ => true,
        }
    }

    /// ROI as a geometry predicate. An empty polygon means the whole frame.
    pub fn region_filter(&self, intersection_ratio_threshold: f64) -> Result<RegionFilter> {
        if self.roi.0.is_empty() {
            Ok(RegionFilter::All)
        } else {
            RegionFilter::polygon(self.roi.0.clone(), intersection_ratio_threshold)
        }
    }

    pub fn min_idle_duration(&self) -> Duration {
        Duration::seconds(self.min_idle_duration_s.unwrap_or(0))
    }
}

/// A stateful occurrence of a triggered alert setting. At most one row with
/// `is_active = true` exists per setting at any time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAlert {
    pub id: Uuid,
    pub setting_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub alert_sent_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserAlert {
    pub fn active_duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }
}

/// Join row used by the notification pass: an unsent active alert together
/// with the setting fields needed to build and address the notification.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingAlert {
    pub alert_id: Uuid,
    pub setting_id: Uuid,
    pub camera_id: Uuid,
    pub trigger_type: TriggerType,
    pub setting_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notify_email: Option<String>,
    pub notify_phone: Option<String>,
}

/// A shareable clip record created when an alert notification goes out.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SharedClip {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub camera_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub clip_url: String,
    pub share_token: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setting(days: Vec<i16>, start: Option<&str>, end: Option<&str>, offset_minutes: i32) -> AlertSetting {
        AlertSetting {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            camera_id: Uuid::new_v4(),
            name: "loading dock".to_string(),
            enabled: true,
            trigger_type: TriggerType::DoNotEnter,
            object_types: Json(vec![]),
            roi: Json(vec![]),
            days_of_week: Json(days),
            daily_start: start.map(|s| s.parse().unwrap()),
            daily_end: end.map(|s| s.parse().unwrap()),
            utc_offset_minutes: offset_minutes,
            min_idle_duration_s: None,
            notify_email: None,
            notify_phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn activation_requires_enabled_weekday() {
        // 2026-08-24 is a Monday
        let monday_noon = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        assert!(setting(vec![0], None, None, 0).is_activated(monday_noon));
        assert!(!setting(vec![5, 6], None, None, 0).is_activated(monday_noon));
    }

    #[test]
    fn activation_window_plain() {
        let s = setting((0..7).collect(), Some("09:00:00"), Some("17:00:00"), 0);
        assert!(s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()));
        assert!(!s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 20, 0, 0).unwrap()));
    }

    #[test]
    fn activation_window_wraps_midnight() {
        let s = setting((0..7).collect(), Some("22:00:00"), Some("06:00:00"), 0);
        assert!(s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 23, 30, 0).unwrap()));
        assert!(s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 3, 0, 0).unwrap()));
        assert!(!s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()));
    }

    #[test]
    fn activation_uses_setting_offset() {
        // 23:00 UTC is 18:00 at UTC-5; window 09:00-19:00 local should match
        let s = setting((0..7).collect(), Some("09:00:00"), Some("19:00:00"), -300);
        assert!(s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 23, 0, 0).unwrap()));
        assert!(!s.is_activated(Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()));
    }

    #[test]
    fn empty_roi_matches_whole_frame() {
        let s = setting(vec![0], None, None, 0);
        assert_eq!(s.region_filter(0.0).unwrap(), RegionFilter::All);
    }
}

pub mod alert_runs;
pub mod alert_settings;
pub mod detections;
pub mod shared_clips;
pub mod user_alerts;

pub use alert_runs::AlertRunsRepository;
pub use alert_settings::AlertSettingsRepository;
pub use detections::DetectionsRepository;
pub use shared_clips::SharedClipsRepository;
pub use user_alerts::UserAlertsRepository;

pub mod alert_models;
pub mod detection_models;

pub use alert_models::{AlertSetting, PendingAlert, SharedClip, TriggerType, UserAlert};
pub use detection_models::{DetectionEvent, TrackKey};

pub mod activity;
pub mod clips;
pub mod notifications;

pub use activity::{ActivityQuery, ActivityService, CameraSource};
pub use clips::{ArchiveClipService, ClipHandle, ClipService};
pub use notifications::{BrokerNotificationSender, EmailSender, SmsSender};

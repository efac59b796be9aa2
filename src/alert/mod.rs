pub mod matcher;
pub mod notifier;
pub mod scheduler;

pub use matcher::{AlertMatcher, MatchSummary};
pub use notifier::{AlertNotifier, NotificationReport};
pub use scheduler::AlertScheduler;

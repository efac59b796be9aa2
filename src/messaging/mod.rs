pub mod broker;
pub mod event;

pub use broker::MessageBroker;
pub use event::{EventMessage, EventType};

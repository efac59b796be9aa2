pub mod alert;
pub mod config;
pub mod db;
pub mod error;
pub mod messaging;
pub mod perception;
pub mod services;

// Re-export main components for easier use
pub use error::Error;
pub use perception::aggregate::{aggregate, aggregate_all, AggregatedInterval, AggregationParams};
pub use perception::category::{ObjectCategory, ObjectType};
pub use perception::compose::{compose, EventInterval};
pub use perception::geometry::{BoundingBox, Point, RegionFilter};

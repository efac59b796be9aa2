pub mod aggregate;
pub mod category;
pub mod compose;
pub mod geometry;

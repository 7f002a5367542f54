//! SeaORM entity definitions for the tagpix schema.

pub mod image_tags;
pub mod images;
pub mod partitions;
pub mod prelude;
pub mod random_sessions;
pub mod tags;

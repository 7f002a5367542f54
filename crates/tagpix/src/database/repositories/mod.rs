//! SeaORM repository implementations.
//!
//! Repositories own a shared connection handle and convert entity models
//! into domain models. Multi-step write flows (upload, selection memos)
//! open their own transactions in the service layer and drive the entity
//! API directly; the repositories here cover the read paths.

pub mod image;
pub mod partition;
pub mod tag;

pub use image::ImageSeaOrmRepository;
pub use partition::PartitionSeaOrmRepository;
pub use tag::TagSeaOrmRepository;

//! Application error types.

pub mod types;

pub use types::{AppError, DeliveryError, RepositoryError, UploadError};

/// Convenience result alias used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

//! Error types for sandboxed store operations.

use std::path::PathBuf;

/// Result type for sandboxed store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during sandboxed store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path validation failed - potential sandbox escape
    #[error("Path validation failed: {path:?} - {reason}")]
    PathValidation { path: PathBuf, reason: String },

    /// Base directory could not be created or resolved
    #[error("Failed to prepare base directory: {path:?} - {source}")]
    BaseDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A blocking task used for an atomic write did not complete
    #[error("Background write task failed: {reason}")]
    TaskFailed { reason: String },
}

//! Error type definitions for the tagpix application.
//!
//! The hierarchy separates the failure classes the service distinguishes
//! at the HTTP boundary: soft not-found outcomes are *not* errors (the
//! delivery path substitutes the fallback image instead), so nothing here
//! models them.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Upload pipeline errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Delivery pipeline errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Errors raised by the upload pipeline. Each variant maps to a distinct
/// HTTP outcome in the web layer.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The exact same content was uploaded before (hash dedupe)
    #[error("Duplicate image: content hash {hash} is already stored")]
    Duplicate { hash: String },

    /// Only PNG and JPEG uploads are accepted
    #[error("Unsupported image format: {detected}")]
    UnsupportedFormat { detected: String },

    /// The upload request itself was malformed (missing parts, bad JSON)
    #[error("Invalid upload payload: {message}")]
    InvalidPayload { message: String },

    /// Decoding or re-encoding the uploaded pixels failed
    #[error("Image processing failed: {message}")]
    Processing { message: String },

    /// The partition backing directory could not be created; the upload
    /// transaction is rolled back and no partial state is kept
    #[error("Failed to allocate partition storage at {path}: {source}")]
    Allocation {
        path: String,
        source: sandboxed_file_store::StoreError,
    },

    /// Writing the normalized file failed
    #[error("Storage error: {0}")]
    Storage(#[from] sandboxed_file_store::StoreError),

    /// Database errors inside the upload transaction
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Errors raised while resolving or rendering a delivery request.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Malformed request path (missing or invalid size segment)
    #[error("Invalid request path: {message}")]
    BadRequest { message: String },

    /// Decode/resize/encode failure on an existing source file. Surfaced
    /// as a server error, never silently replaced with the fallback image.
    #[error("Image processing failed for {path}: {message}")]
    Processing { path: String, message: String },

    /// Reading or writing a render artifact failed
    #[error("Render cache I/O failed for {path}: {message}")]
    CacheIo { path: String, message: String },
}

/// Convenience methods for creating common error types.
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for a resource/id pair
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl DeliveryError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

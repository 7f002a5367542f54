//! HTTP response types and utilities
//!
//! Standardized JSON response envelope for the API endpoints plus the
//! central mapping from [`AppError`] to HTTP status codes. The delivery
//! endpoint builds its image responses by hand and only uses the error
//! mapping here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, DeliveryError, UploadError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an error response
    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Success response helpers
pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn no_content() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// Convert AppError to the appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::NotFound { resource, id } => (
            StatusCode::NOT_FOUND,
            format!("{resource} with id '{id}' not found"),
        ),
        AppError::Upload(upload) => match upload {
            UploadError::Duplicate { .. } => (StatusCode::CONFLICT, upload.to_string()),
            UploadError::UnsupportedFormat { .. } | UploadError::InvalidPayload { .. } => {
                (StatusCode::BAD_REQUEST, upload.to_string())
            }
            UploadError::Processing { .. }
            | UploadError::Allocation { .. }
            | UploadError::Storage(_)
            | UploadError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Upload failed".to_string())
            }
        },
        AppError::Delivery(delivery) => match delivery {
            DeliveryError::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            DeliveryError::Processing { .. } | DeliveryError::CacheIo { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Image processing failed".to_string(),
            ),
        },
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {message}"),
        ),
        AppError::Database(_) | AppError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database operation failed".to_string(),
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {message}"),
        ),
    };

    if status.is_server_error() {
        tracing::error!("request failed: {error}");
    }

    (status, Json(ApiResponse::<()>::error(message))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        handle_error(self)
    }
}

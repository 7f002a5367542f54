//! Image upload and mutation HTTP handlers.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, UploadError};
use crate::services::{NewUpload, RotateDirection};
use crate::web::AppState;
use crate::web::responses::{created, no_content, ok};

/// JSON carried in the `payload` multipart part.
#[derive(Debug, Deserialize)]
struct UploadPayload {
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_id: Uuid,
    pub tags: Vec<String>,
}

/// `POST /api/v1/images`: multipart upload with a `file` part and a
/// `payload` part (`{"tags": [...]}`).
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut payload: Option<UploadPayload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::Upload(UploadError::InvalidPayload {
            message: e.to_string(),
        })
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::Upload(UploadError::InvalidPayload {
                        message: e.to_string(),
                    })
                })?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("payload") => {
                let raw = field.bytes().await.map_err(|e| {
                    AppError::Upload(UploadError::InvalidPayload {
                        message: e.to_string(),
                    })
                })?;
                let parsed = serde_json::from_slice(&raw).map_err(|e| {
                    AppError::Upload(UploadError::InvalidPayload {
                        message: format!("invalid JSON in payload: {e}"),
                    })
                })?;
                payload = Some(parsed);
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or(AppError::Upload(UploadError::InvalidPayload {
        message: "missing file part".to_string(),
    }))?;
    let payload = payload.ok_or(AppError::Upload(UploadError::InvalidPayload {
        message: "missing payload part".to_string(),
    }))?;

    let stored = state
        .image_service
        .store(NewUpload {
            file_name,
            bytes,
            tags: payload.tags,
        })
        .await?;

    Ok(created(UploadResponse {
        image_id: stored.image.id,
        tags: stored.tags,
    }))
}

/// `DELETE /api/v1/images/{id}`: soft delete.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.image_service.soft_delete(id).await?;
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub direction: String,
}

/// `POST /api/v1/images/{id}/rotate`: rotate the stored file 90° and
/// bump its modification time, invalidating derived renders.
pub async fn rotate_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RotateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let direction = RotateDirection::from_code(&request.direction)
        .ok_or_else(|| AppError::validation("direction must be \"R\" or \"L\""))?;

    state.image_service.rotate(id, direction).await?;
    Ok(ok(serde_json::json!({ "rotated": id })))
}

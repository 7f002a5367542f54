//! Tag query and association HTTP handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::web::AppState;
use crate::web::responses::ok;

/// `GET /api/v1/tags`: all tags with live usage counts.
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tags = state.tag_repo.list_with_usage().await?;
    Ok(ok(tags))
}

/// `GET /api/v1/images/{id}/tags`: tag titles for one live image.
pub async fn list_image_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .image_repo
        .find_active(&id)
        .await?
        .ok_or_else(|| AppError::not_found("image", id.to_string()))?;

    let titles = state.tag_repo.titles_for_image(&id).await?;
    Ok(ok(titles))
}

#[derive(Debug, Deserialize)]
pub struct AddTagRequest {
    pub tag: String,
}

/// `POST /api/v1/images/{id}/tags`: idempotently attach a tag.
pub async fn add_image_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddTagRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.image_service.add_tag(id, &request.tag).await?;
    Ok(ok(serde_json::json!({ "tagged": id })))
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    /// Comma-separated match-all tag filter; empty counts everything live
    pub tags: Option<String>,
}

/// `GET /api/v1/images/count?tags=a,b`: candidate count for a filter.
pub async fn count_images(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tag_filter: Vec<String> = query
        .tags
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let count = state.image_repo.count_candidates(&tag_filter).await?;
    Ok(ok(serde_json::json!({ "count": count })))
}

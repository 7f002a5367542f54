//! The tag-filtered, size-adjustable image delivery endpoint.
//!
//! Path shape: `/{size}/{tag}*/{indexOrRandom}` where `size` is
//! `original`, a bare width (square), or `WIDTHxHEIGHT`. A trailing
//! `random` / `random_N` segment switches to sticky-random selection; a
//! trailing number is a 1-based rotation index (default 1); everything in
//! between is a match-all tag filter.

use axum::extract::{Path, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::errors::{AppError, DeliveryError};
use crate::services::{ClientIdentity, Rendered, SelectionMode, SizeSpec};
use crate::web::AppState;
use crate::web::utils::{format_http_date, parse_http_date};

/// A parsed delivery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryRequest {
    pub size: SizeSpec,
    pub tags: Vec<String>,
    pub mode: SelectionMode,
}

/// GET handler for the wildcard delivery route.
pub async fn deliver_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
    client: ClientIdentity,
    headers: HeaderMap,
) -> Response {
    match resolve_and_render(&state, &path, &client).await {
        Ok(rendered) => {
            image_response(rendered, &headers, state.config.delivery.cache_lifetime)
        }
        Err(error) => error.into_response(),
    }
}

async fn resolve_and_render(
    state: &AppState,
    path: &str,
    client: &ClientIdentity,
) -> Result<Rendered, AppError> {
    let request = parse_delivery_path(path).map_err(AppError::from)?;

    let selected = state
        .selection
        .select(&request.tags, &request.size.label(), request.mode, client)
        .await?;

    let source = match selected {
        Some(image) => {
            let partition = state.partition_repo.require(image.partition_id).await?;
            let relative = image.relative_path(&partition.folder_name);
            let absolute = state
                .upload_store
                .resolve(&relative)
                .map_err(|e| AppError::internal(e.to_string()))?;
            if tokio::fs::try_exists(&absolute).await.unwrap_or(false) {
                absolute
            } else {
                // A row without its backing file is served like a miss.
                warn!("stored file missing on disk: {relative}");
                fallback_path(state)?
            }
        }
        None => fallback_path(state)?,
    };

    let rendered = state.render_cache.resolve(&source, &request.size).await?;
    Ok(rendered)
}

fn fallback_path(state: &AppState) -> Result<PathBuf, AppError> {
    let path = state.config.storage.fallback_image.clone();
    if path.exists() {
        Ok(path)
    } else {
        Err(AppError::configuration(format!(
            "fallback image not found at {}",
            path.display()
        )))
    }
}

/// Build the 200/304 response with the conditional-caching header set.
fn image_response(rendered: Rendered, request_headers: &HeaderMap, cache_lifetime: Duration) -> Response {
    let etag = format!("\"{}\"", rendered.etag);
    let last_modified = format_http_date(rendered.last_modified);
    let cache_control = format!("public, max-age={}", cache_lifetime.as_secs());

    let etag_matches = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim() == etag)
        .unwrap_or(false);

    // Header dates carry second precision, so compare truncated.
    let not_modified_since = request_headers
        .get(IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .map(|since| since.timestamp() >= rendered.last_modified.timestamp())
        .unwrap_or(false);

    if etag_matches || not_modified_since {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(ETAG, &etag)
            .header(LAST_MODIFIED, &last_modified)
            .header(CACHE_CONTROL, &cache_control)
            .body(axum::body::Body::empty())
            .expect("static not-modified response")
            .into_response();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "image/jpeg")
        .header(CONTENT_LENGTH, rendered.bytes.len())
        .header(ETAG, &etag)
        .header(LAST_MODIFIED, &last_modified)
        .header(CACHE_CONTROL, &cache_control)
        .body(axum::body::Body::from(rendered.bytes))
        .expect("static image response")
        .into_response()
}

/// Parse the logical `{size}/{tag}*/{indexOrRandom}` path.
pub(crate) fn parse_delivery_path(path: &str) -> Result<DeliveryRequest, DeliveryError> {
    let mut segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(DeliveryError::bad_request("missing size segment"));
    }

    let size = parse_size(segments.remove(0))?;

    let mode = if segments.last().is_some_and(|last| is_random_marker(last)) {
        segments.pop();
        SelectionMode::Random
    } else if segments
        .last()
        .is_some_and(|last| last.bytes().all(|b| b.is_ascii_digit()))
    {
        let digits = segments.pop().expect("checked non-empty");
        // Absurdly long digit strings still wrap like any other index.
        let index = digits.parse::<u64>().unwrap_or(u64::MAX).max(1);
        SelectionMode::Rotation { index }
    } else {
        SelectionMode::Rotation { index: 1 }
    };

    Ok(DeliveryRequest {
        size,
        tags: segments.into_iter().map(str::to_string).collect(),
        mode,
    })
}

fn parse_size(segment: &str) -> Result<SizeSpec, DeliveryError> {
    if segment.eq_ignore_ascii_case("original") {
        return Ok(SizeSpec::Original);
    }

    if let Some((w, h)) = segment.split_once(['x', 'X']) {
        let width = parse_dimension(w, segment)?;
        let height = parse_dimension(h, segment)?;
        return Ok(SizeSpec::Exact { width, height });
    }

    let width = parse_dimension(segment, segment)?;
    Ok(SizeSpec::Exact {
        width,
        height: width,
    })
}

fn parse_dimension(value: &str, segment: &str) -> Result<u32, DeliveryError> {
    match value.parse::<u32>() {
        Ok(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(DeliveryError::bad_request(format!(
            "invalid size segment '{segment}'"
        ))),
    }
}

fn is_random_marker(segment: &str) -> bool {
    let lowered = segment.to_ascii_lowercase();
    if lowered == "random" {
        return true;
    }
    lowered
        .strip_prefix("random_")
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str) -> DeliveryRequest {
        parse_delivery_path(path).unwrap()
    }

    #[test]
    fn size_variants() {
        assert_eq!(parse("original").size, SizeSpec::Original);
        assert_eq!(parse("Original/cats").size, SizeSpec::Original);
        assert_eq!(
            parse("300").size,
            SizeSpec::Exact {
                width: 300,
                height: 300
            }
        );
        assert_eq!(
            parse("640x480").size,
            SizeSpec::Exact {
                width: 640,
                height: 480
            }
        );
        assert_eq!(
            parse("640X480").size,
            SizeSpec::Exact {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        assert!(parse_delivery_path("").is_err());
        assert!(parse_delivery_path("/").is_err());
        assert!(parse_delivery_path("banner/cats").is_err());
        assert!(parse_delivery_path("0").is_err());
        assert!(parse_delivery_path("300x0").is_err());
        assert!(parse_delivery_path("300x-4").is_err());
        assert!(parse_delivery_path("x300").is_err());
    }

    #[test]
    fn trailing_number_is_the_rotation_index() {
        let request = parse("300/cats/dogs/7");
        assert_eq!(request.tags, ["cats", "dogs"]);
        assert_eq!(request.mode, SelectionMode::Rotation { index: 7 });
    }

    #[test]
    fn index_defaults_to_one() {
        let request = parse("300/cats");
        assert_eq!(request.tags, ["cats"]);
        assert_eq!(request.mode, SelectionMode::Rotation { index: 1 });

        let bare = parse("original");
        assert!(bare.tags.is_empty());
        assert_eq!(bare.mode, SelectionMode::Rotation { index: 1 });
    }

    #[test]
    fn zero_index_clamps_to_one() {
        assert_eq!(parse("300/0").mode, SelectionMode::Rotation { index: 1 });
    }

    #[test]
    fn random_markers() {
        assert_eq!(parse("300/cats/random").mode, SelectionMode::Random);
        assert_eq!(parse("300/cats/RANDOM").mode, SelectionMode::Random);
        assert_eq!(parse("300/cats/random_5").mode, SelectionMode::Random);
        assert_eq!(parse("300/cats/random_5").tags, ["cats"]);

        // Not markers: these are plain tags.
        assert_eq!(parse("300/randomize").tags, ["randomize"]);
        assert_eq!(parse("300/random_").tags, ["random_"]);
        assert_eq!(parse("300/random_x").tags, ["random_x"]);
    }

    #[test]
    fn numeric_looking_tags_stay_tags_when_followed_by_index() {
        // Only the trailing segment is index-like; earlier numerics are tags.
        let request = parse("300/2024/3");
        assert_eq!(request.tags, ["2024"]);
        assert_eq!(request.mode, SelectionMode::Rotation { index: 3 });
    }

    #[test]
    fn overlong_indices_saturate_instead_of_failing() {
        let request = parse("300/99999999999999999999999999");
        assert_eq!(
            request.mode,
            SelectionMode::Rotation { index: u64::MAX }
        );
    }
}

/// Blob serving endpoint
use crate::{
    context::AppContext,
    error::{PostError, PostResult},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, response::Builder, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};

/// Keys are never reused, so served bytes never change
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build blob routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/blob/:key", get(get_blob))
}

fn finish(builder: Builder, body: Body) -> PostResult<Response> {
    builder
        .body(body)
        .map_err(|e| PostError::Internal(format!("Failed to build blob response: {}", e)))
}

/// Get a blob by storage key
///
/// Serves blob content with proper Content-Type, caching headers, and Range request support
async fn get_blob(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> PostResult<Response> {
    let (data, mime_type) = ctx
        .blob_store
        .get(&key)
        .await?
        .ok_or_else(|| PostError::NotFound(format!("Blob not found: {}", key)))?;

    let total_size = data.len();
    let etag = format!("\"{}\"", key);

    // Check If-None-Match header for 304 Not Modified
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if not_modified {
        return finish(
            Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, IMMUTABLE),
            Body::empty(),
        );
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total_size));

    if let Some((start, end)) = range {
        let length = end - start + 1;
        let partial_data = data[start..=end].to_vec();

        return finish(
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, mime_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, total_size),
                )
                .header(header::ETAG, etag)
                .header(header::CACHE_CONTROL, IMMUTABLE)
                .header(header::ACCEPT_RANGES, "bytes"),
            Body::from(partial_data),
        );
    }

    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_type)
            .header(header::CONTENT_LENGTH, total_size.to_string())
            .header(header::ETAG, etag)
            .header(header::CACHE_CONTROL, IMMUTABLE)
            .header(header::ACCEPT_RANGES, "bytes"),
        Body::from(data),
    )
}

/// Parse HTTP Range header
///
/// Returns (start, end) inclusive byte positions, or None if invalid
fn parse_range(range_header: &str, total_size: usize) -> Option<(usize, usize)> {
    // Expected format: "bytes=start-end" or "bytes=start-" or "bytes=-suffix"
    let range_spec = range_header.trim().strip_prefix("bytes=")?;
    let (start_str, end_str) = range_spec.split_once('-')?;

    if total_size == 0 {
        return None;
    }

    match (start_str.is_empty(), end_str.is_empty()) {
        // Suffix range: "bytes=-500" (last 500 bytes)
        (true, false) => {
            let suffix = end_str.parse::<usize>().ok().filter(|n| *n > 0)?;
            Some((total_size.saturating_sub(suffix), total_size - 1))
        }
        // Open-ended range: "bytes=500-"
        (false, true) => {
            let start = start_str.parse::<usize>().ok()?;
            (start < total_size).then_some((start, total_size - 1))
        }
        (false, false) => {
            let start = start_str.parse::<usize>().ok()?;
            // Clamp end to total_size - 1
            let end = end_str.parse::<usize>().ok()?.min(total_size - 1);
            (start < total_size && start <= end).then_some((start, end))
        }
        (true, true) => None,
    }
}

//! Blob read handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use pincer_core::Digest;
use pincer_storage::Namespace;

/// GET/HEAD /v2/<name>/blobs/<digest>
///
/// HEAD answers 200 as soon as the mapping knows the digest; GET resolves
/// the content reference and streams the payload.
pub async fn blob(
    state: &AppState,
    image: &str,
    digest: &str,
    include_body: bool,
) -> ApiResult<Response> {
    let digest = Digest::parse(digest)?;
    let content_ref = state
        .mapping
        .lookup_blob(image, &digest)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("blob unknown: {digest}")))?;

    if !include_body {
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE.as_str(), "application/octet-stream")],
            Body::empty(),
        )
            .into_response());
    }

    let stream = state
        .resolver
        .open(&content_ref, Some(&digest), Namespace::Blobs)
        .await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE.as_str(), "application/octet-stream")],
        Body::from_stream(stream),
    )
        .into_response())
}

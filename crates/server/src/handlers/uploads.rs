//! Chunked blob upload handlers.
//!
//! POST opens a session, PATCH appends raw chunks, PUT finalizes against the
//! declared digest and schedules the background pin. The OCI protocol
//! serializes PATCH/PUT per upload id on the client side.

use crate::auth::require_credential;
use crate::error::{ApiError, ApiResult};
use crate::handlers::DOCKER_CONTENT_DIGEST;
use crate::pipeline::{self, PinTarget};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pincer_core::Digest;
use serde::Deserialize;
use uuid::Uuid;

/// Docker-Upload-UUID response header.
const DOCKER_UPLOAD_UUID: &str = "docker-upload-uuid";

/// Upper bound on a single request body. Sessions buffer blobs in memory,
/// so this caps one chunk (or one monolithic PUT), not the whole blob.
const MAX_CHUNK_SIZE: usize = 1024 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadQuery {
    digest: Option<String>,
}

fn upload_location(image: &str, upload_id: &str) -> String {
    format!("/v2/{image}/blobs/uploads/{upload_id}")
}

fn parse_upload_id(upload_id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(upload_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid upload ID: {e}")))
}

/// POST /v2/<name>/blobs/uploads/
pub async fn start_upload(state: &AppState, image: &str, headers: &HeaderMap) -> ApiResult<Response> {
    require_credential(headers)?;
    let upload_id = state.sessions.start(image).await;
    tracing::info!(image = %image, upload_id = %upload_id, "upload session started");
    Ok((
        StatusCode::ACCEPTED,
        [
            (header::LOCATION.as_str(), upload_location(image, &upload_id.to_string())),
            (DOCKER_UPLOAD_UUID, upload_id.to_string()),
            (header::RANGE.as_str(), "0-0".to_string()),
        ],
        Body::empty(),
    )
        .into_response())
}

/// PATCH /v2/<name>/blobs/uploads/<uploadId>
pub async fn patch_upload(
    state: &AppState,
    image: &str,
    upload_id: &str,
    req: Request,
) -> ApiResult<Response> {
    require_credential(req.headers())?;
    let id = parse_upload_id(upload_id)?;

    let chunk = axum::body::to_bytes(req.into_body(), MAX_CHUNK_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read chunk: {e}")))?;
    if chunk.is_empty() {
        return Err(ApiError::BadRequest("No data provided".to_string()));
    }

    let size = state.sessions.append(id, chunk).await?;
    tracing::debug!(upload_id = %id, size, "chunk appended");

    Ok((
        StatusCode::ACCEPTED,
        [
            (header::LOCATION.as_str(), upload_location(image, upload_id)),
            (DOCKER_UPLOAD_UUID, upload_id.to_string()),
            (header::RANGE.as_str(), format!("0-{}", size - 1)),
        ],
        Body::empty(),
    )
        .into_response())
}

/// PUT /v2/<name>/blobs/uploads/<uploadId>?digest=<d>
#[tracing::instrument(skip(state, req), fields(image = %image, upload_id = %upload_id))]
pub async fn put_upload(
    state: &AppState,
    image: &str,
    upload_id: &str,
    req: Request,
) -> ApiResult<Response> {
    let credential = require_credential(req.headers())?;
    let id = parse_upload_id(upload_id)?;

    let Query(params) = Query::<UploadQuery>::try_from_uri(req.uri())
        .map_err(|e| ApiError::BadRequest(format!("invalid query string: {e}")))?;
    let declared = params
        .digest
        .ok_or_else(|| ApiError::BadRequest("digest query parameter required".to_string()))?;
    let expected = Digest::parse(&declared)?;

    // A monolithic PUT may carry the final (or only) chunk.
    let chunk = axum::body::to_bytes(req.into_body(), MAX_CHUNK_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    if !chunk.is_empty() {
        state.sessions.append(id, chunk).await?;
    }

    let finalized = state
        .sessions
        .finalize(id, Some(&expected), &state.local)
        .await?;
    state.mapping.record_blob(image, &finalized.digest).await?;

    tracing::info!(
        digest = %finalized.digest,
        size = finalized.data.len(),
        "blob committed"
    );

    let digest_str = finalized.digest.to_string();
    pipeline::schedule_pin(
        state,
        credential,
        image.to_string(),
        PinTarget::Blob {
            digest: finalized.digest,
        },
        finalized.data,
    );

    Ok((
        StatusCode::CREATED,
        [
            (
                header::LOCATION.as_str(),
                format!("/v2/{image}/blobs/{digest_str}"),
            ),
            (DOCKER_CONTENT_DIGEST, digest_str),
        ],
        Body::empty(),
    )
        .into_response())
}

//! Manifest read/write handlers.

use crate::auth::require_credential;
use crate::error::{ApiError, ApiResult};
use crate::handlers::DOCKER_CONTENT_DIGEST;
use crate::pipeline::{self, PinTarget};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use pincer_core::{ContentRef, Digest, manifest};
use pincer_storage::Namespace;
use serde_json::Value;

/// Maximum accepted manifest body (4 MiB); real manifests are a few KiB.
const MAX_MANIFEST_SIZE: usize = 4 * 1024 * 1024;

/// HEAD /v2/<name>/manifests/<ref>
///
/// `Docker-Content-Digest` carries the local digest while the mapping still
/// holds one, the remote content id after the pin rewrite.
pub async fn head_manifest(state: &AppState, image: &str, reference: &str) -> ApiResult<Response> {
    let content_ref = state
        .mapping
        .lookup_manifest(image, reference)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("manifest unknown: {image}:{reference}")))?;
    Ok((
        StatusCode::OK,
        [(DOCKER_CONTENT_DIGEST, content_ref.to_string())],
        Body::empty(),
    )
        .into_response())
}

/// GET /v2/<name>/manifests/<ref>
pub async fn get_manifest(state: &AppState, image: &str, reference: &str) -> ApiResult<Response> {
    let content_ref = state
        .mapping
        .lookup_manifest(image, reference)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("manifest unknown: {image}:{reference}")))?;

    // Digest-shaped references double as the local fallback for remote refs.
    let fallback = Digest::parse(reference).ok();
    let data = state
        .resolver
        .fetch(&content_ref, fallback.as_ref(), Namespace::Manifests)
        .await?;

    let doc: Value = serde_json::from_slice(&data)
        .map_err(|e| ApiError::Internal(format!("stored manifest is not valid JSON: {e}")))?;
    let media_type = manifest::media_type_of(&doc);
    let digest = Digest::compute(&data);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE.as_str(), media_type),
            (header::CONTENT_LENGTH.as_str(), data.len().to_string()),
            (DOCKER_CONTENT_DIGEST, digest.to_string()),
        ],
        Body::from(data),
    )
        .into_response())
}

/// PUT /v2/<name>/manifests/<ref>
#[tracing::instrument(skip(state, req), fields(image = %image, reference = %reference))]
pub async fn put_manifest(
    state: &AppState,
    image: &str,
    reference: &str,
    req: Request,
) -> ApiResult<Response> {
    let credential = require_credential(req.headers())?;

    let body = axum::body::to_bytes(req.into_body(), MAX_MANIFEST_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("No manifest data provided".to_string()));
    }
    let doc: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid manifest JSON: {e}")))?;

    // Stored verbatim: the digest must equal what the client computed over
    // the wire body.
    let manifest_digest = state.local.save_manifest(body.clone()).await?;

    // Resolve every referenced layer against the current mapping; layers the
    // client never pushed here are skipped rather than rejected.
    let mut blob_map = Vec::new();
    for layer in manifest::layer_digests(&doc) {
        let Ok(layer_digest) = Digest::parse(&layer) else {
            continue;
        };
        if let Some(layer_ref) = state.mapping.lookup_blob(image, &layer_digest).await {
            blob_map.push((layer_digest, layer_ref));
        }
    }

    let local_ref = ContentRef::Local(manifest_digest);
    let digest_str = manifest_digest.to_string();
    state
        .mapping
        .add_manifest(image, reference, &local_ref, &blob_map)
        .await?;
    let mut references = vec![reference.to_string()];
    if reference != digest_str {
        // Digest alias so pulls by digest resolve to the same bytes.
        state
            .mapping
            .add_manifest(image, &digest_str, &local_ref, &blob_map)
            .await?;
        references.push(digest_str.clone());
    }

    tracing::info!(
        digest = %digest_str,
        layers = blob_map.len(),
        "manifest accepted"
    );

    pipeline::schedule_pin(
        state,
        credential,
        image.to_string(),
        PinTarget::Manifest {
            digest: manifest_digest,
            references,
        },
        body,
    );

    Ok((
        StatusCode::CREATED,
        [(DOCKER_CONTENT_DIGEST, digest_str)],
        Body::empty(),
    )
        .into_response())
}

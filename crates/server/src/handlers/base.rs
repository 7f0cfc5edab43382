//! Version check and health endpoints.

use crate::error::ApiError;
use axum::Json;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Version check response.
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    version: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// GET/HEAD /v2/ — API version check and authentication handshake.
///
/// Docker only replays stored credentials after being challenged, so an
/// unauthenticated probe gets a 401 even though reads are otherwise public.
pub async fn api_version(headers: HeaderMap) -> Response {
    if !headers.contains_key(AUTHORIZATION) {
        return ApiError::Unauthorized.into_response();
    }
    Json(VersionResponse { version: "2.0" }).into_response()
}

/// GET /health — liveness probe, intentionally unauthenticated.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

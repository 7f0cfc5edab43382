//! HTTP request handlers.

pub mod base;
pub mod blobs;
pub mod manifests;
pub mod uploads;

pub use base::{api_version, health_check};

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Docker-Content-Digest response header.
pub const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// A parsed `/v2/...` request target.
///
/// Image names are opaque and may span several path segments
/// (e.g. `test/pincer-self-test`), so they cannot be captured with router
/// patterns; these are matched manually by [`parse_v2_path`].
#[derive(Debug, PartialEq, Eq)]
pub enum RegistryRoute {
    Manifest { image: String, reference: String },
    Blob { image: String, digest: String },
    UploadStart { image: String },
    Upload { image: String, upload_id: String },
}

/// Parse an OCI path: the image name is the maximal run of segments between
/// `/v2/` and the last fixed segment (`blobs/uploads`, `manifests`, `blobs`).
pub fn parse_v2_path(path: &str) -> Option<RegistryRoute> {
    let rest = path.strip_prefix("/v2/")?;

    // blobs/uploads first: a plain "/blobs/" search would also match it.
    if let Some(idx) = rest.rfind("/blobs/uploads") {
        let image = &rest[..idx];
        let tail = &rest[idx + "/blobs/uploads".len()..];
        if image.is_empty() {
            return None;
        }
        return match tail {
            "" | "/" => Some(RegistryRoute::UploadStart {
                image: image.to_string(),
            }),
            _ => {
                let upload_id = tail.strip_prefix('/')?;
                if upload_id.is_empty() || upload_id.contains('/') {
                    return None;
                }
                Some(RegistryRoute::Upload {
                    image: image.to_string(),
                    upload_id: upload_id.to_string(),
                })
            }
        };
    }

    if let Some(idx) = rest.rfind("/manifests/") {
        let image = &rest[..idx];
        let reference = &rest[idx + "/manifests/".len()..];
        if image.is_empty() || reference.is_empty() || reference.contains('/') {
            return None;
        }
        return Some(RegistryRoute::Manifest {
            image: image.to_string(),
            reference: reference.to_string(),
        });
    }

    if let Some(idx) = rest.rfind("/blobs/") {
        let image = &rest[..idx];
        let digest = &rest[idx + "/blobs/".len()..];
        if image.is_empty() || digest.is_empty() || digest.contains('/') {
            return None;
        }
        return Some(RegistryRoute::Blob {
            image: image.to_string(),
            digest: digest.to_string(),
        });
    }

    None
}

/// Fallback dispatcher for every `/v2/<name>/...` route.
pub async fn registry_fallback(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    if !path.starts_with("/v2/") {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }
    let Some(route) = parse_v2_path(&path) else {
        return ApiError::BadRequest(format!("unrecognized registry path: {path}")).into_response();
    };

    let method = req.method().as_str().to_string();
    let result = match (method.as_str(), route) {
        ("HEAD", RegistryRoute::Manifest { image, reference }) => {
            manifests::head_manifest(&state, &image, &reference).await
        }
        ("GET", RegistryRoute::Manifest { image, reference }) => {
            manifests::get_manifest(&state, &image, &reference).await
        }
        ("PUT", RegistryRoute::Manifest { image, reference }) => {
            manifests::put_manifest(&state, &image, &reference, req).await
        }
        ("HEAD", RegistryRoute::Blob { image, digest }) => {
            blobs::blob(&state, &image, &digest, false).await
        }
        ("GET", RegistryRoute::Blob { image, digest }) => {
            blobs::blob(&state, &image, &digest, true).await
        }
        ("POST", RegistryRoute::UploadStart { image }) => {
            uploads::start_upload(&state, &image, req.headers()).await
        }
        ("PATCH", RegistryRoute::Upload { image, upload_id }) => {
            uploads::patch_upload(&state, &image, &upload_id, req).await
        }
        ("PUT", RegistryRoute::Upload { image, upload_id }) => {
            uploads::put_upload(&state, &image, &upload_id, req).await
        }
        _ => Err(ApiError::BadRequest(format!(
            "method {method} not supported here"
        ))),
    };

    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

//! Integration tests for the OCI HTTP endpoints.

mod common;

use axum::http::StatusCode;
use bytes::Bytes;
use common::{TestServer, basic_auth, send};
use pincer_core::Digest;
use serde_json::{Value, json};
use std::sync::atomic::Ordering;

const HELLO_DIGEST: &str = "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn auth() -> String {
    basic_auth("deadbeef")
}

/// Walk the upload state machine: POST start, PATCH chunks, PUT finalize.
/// Returns the blob's digest string.
async fn push_blob(server: &TestServer, image: &str, chunks: &[&[u8]]) -> String {
    let (status, headers, _) = send(
        &server.router,
        "POST",
        &format!("/v2/{image}/blobs/uploads"),
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let upload_id = headers
        .get("docker-upload-uuid")
        .expect("missing Docker-Upload-UUID")
        .to_str()
        .unwrap()
        .to_string();

    for chunk in chunks {
        let (status, _, _) = send(
            &server.router,
            "PATCH",
            &format!("/v2/{image}/blobs/uploads/{upload_id}"),
            Some(Bytes::copy_from_slice(chunk)),
            Some(&auth()),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let whole: Vec<u8> = chunks.concat();
    let digest = Digest::compute(&whole).to_string();
    let (status, headers, _) = send(
        &server.router,
        "PUT",
        &format!("/v2/{image}/blobs/uploads/{upload_id}?digest={digest}"),
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers.get("docker-content-digest").unwrap().to_str().unwrap(),
        digest
    );
    digest
}

#[tokio::test]
async fn v2_root_challenges_then_accepts() {
    let server = TestServer::new().await;

    let (status, headers, _) = send(&server.router, "GET", "/v2/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let challenge = headers.get("www-authenticate").unwrap().to_str().unwrap();
    assert!(challenge.starts_with("Basic realm="));

    let (status, _, body) = send(&server.router, "GET", "/v2/", None, Some(&auth())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"version": "2.0"}));
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::new().await;
    let (status, _, body) = send(&server.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn write_endpoints_require_auth() {
    let server = TestServer::new().await;

    let (status, headers, _) = send(
        &server.router,
        "POST",
        "/v2/lib/app/blobs/uploads",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key("www-authenticate"));

    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/v2/lib/app/manifests/latest",
        Some(Bytes::from_static(b"{}")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_start_returns_location_and_range() {
    let server = TestServer::new().await;
    let (status, headers, _) = send(
        &server.router,
        "POST",
        "/v2/test/pincer-self-test/blobs/uploads",
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let upload_id = headers.get("docker-upload-uuid").unwrap().to_str().unwrap();
    let location = headers.get("location").unwrap().to_str().unwrap();
    assert_eq!(
        location,
        format!("/v2/test/pincer-self-test/blobs/uploads/{upload_id}")
    );
    assert_eq!(headers.get("range").unwrap().to_str().unwrap(), "0-0");
}

#[tokio::test]
async fn empty_patch_is_rejected() {
    let server = TestServer::new().await;
    let (_, headers, _) = send(
        &server.router,
        "POST",
        "/v2/lib/app/blobs/uploads",
        None,
        Some(&auth()),
    )
    .await;
    let upload_id = headers.get("docker-upload-uuid").unwrap().to_str().unwrap();

    let (status, _, body) = send(
        &server.router,
        "PATCH",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}"),
        Some(Bytes::new()),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"error": "No data provided"}));

    // The session is still usable after the rejected chunk.
    let (status, _, _) = send(
        &server.router,
        "PATCH",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}"),
        Some(Bytes::from_static(b"data")),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn patch_against_unknown_upload_is_404() {
    let server = TestServer::new().await;
    let (status, _, _) = send(
        &server.router,
        "PATCH",
        &format!("/v2/lib/app/blobs/uploads/{}", uuid::Uuid::new_v4()),
        Some(Bytes::from_static(b"data")),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_with_correct_digest_commits_the_blob() {
    let server = TestServer::new().await;

    let (_, headers, _) = send(
        &server.router,
        "POST",
        "/v2/lib/app/blobs/uploads",
        None,
        Some(&auth()),
    )
    .await;
    let upload_id = headers.get("docker-upload-uuid").unwrap().to_str().unwrap();

    let (status, _, _) = send(
        &server.router,
        "PATCH",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}"),
        Some(Bytes::from_static(b"hello")),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, headers, _) = send(
        &server.router,
        "PUT",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}?digest={HELLO_DIGEST}"),
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers.get("docker-content-digest").unwrap().to_str().unwrap(),
        HELLO_DIGEST
    );
    assert_eq!(
        headers.get("location").unwrap().to_str().unwrap(),
        format!("/v2/lib/app/blobs/{HELLO_DIGEST}")
    );

    // The digest is retrievable immediately.
    let (status, headers, body) = send(
        &server.router,
        "GET",
        &format!("/v2/lib/app/blobs/{HELLO_DIGEST}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap().to_str().unwrap(),
        "application/octet-stream"
    );
    assert_eq!(body, Bytes::from_static(b"hello"));

    let (status, _, _) = send(
        &server.router,
        "HEAD",
        &format!("/v2/lib/app/blobs/{HELLO_DIGEST}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn put_with_wrong_digest_is_rejected_without_a_mapping() {
    let server = TestServer::new().await;

    let (_, headers, _) = send(
        &server.router,
        "POST",
        "/v2/lib/app/blobs/uploads",
        None,
        Some(&auth()),
    )
    .await;
    let upload_id = headers.get("docker-upload-uuid").unwrap().to_str().unwrap();

    send(
        &server.router,
        "PATCH",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}"),
        Some(Bytes::from_static(b"hello")),
        Some(&auth()),
    )
    .await;

    let wrong = format!("sha256:{}", "0".repeat(64));
    let (status, _, body) = send(
        &server.router,
        "PUT",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}?digest={wrong}"),
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("mismatch"));

    // No mapping entry was created for either digest.
    let (status, _, _) = send(
        &server.router,
        "GET",
        &format!("/v2/lib/app/blobs/{HELLO_DIGEST}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn put_without_digest_param_is_rejected() {
    let server = TestServer::new().await;

    let (_, headers, _) = send(
        &server.router,
        "POST",
        "/v2/lib/app/blobs/uploads",
        None,
        Some(&auth()),
    )
    .await;
    let upload_id = headers.get("docker-upload-uuid").unwrap().to_str().unwrap();

    let (status, _, _) = send(
        &server.router,
        "PUT",
        &format!("/v2/lib/app/blobs/uploads/{upload_id}"),
        Some(Bytes::from_static(b"hello")),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manifest_roundtrips_by_tag_and_digest() {
    let server = TestServer::new().await;
    let image = "test/pincer-self-test";

    let layer_digest = push_blob(&server, image, &[b"layer-bytes"]).await;

    // Spacing is deliberate: byte fidelity means the digest covers it.
    let manifest = format!(
        "{{\"schemaVersion\":2, \"layers\":[{{\"digest\":\"{layer_digest}\",\"size\":11}}]}}"
    );
    let manifest = Bytes::from(manifest);
    let expected_digest = Digest::compute(&manifest).to_string();

    let (status, headers, _) = send(
        &server.router,
        "PUT",
        &format!("/v2/{image}/manifests/latest"),
        Some(manifest.clone()),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers.get("docker-content-digest").unwrap().to_str().unwrap(),
        expected_digest
    );

    // GET by tag: byte-identical body, derived content type, digest header.
    let (status, headers, body) = send(
        &server.router,
        "GET",
        &format!("/v2/{image}/manifests/latest"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, manifest);
    assert_eq!(
        headers.get("content-type").unwrap().to_str().unwrap(),
        "application/vnd.docker.distribution.manifest.v2+json"
    );
    assert_eq!(
        headers.get("content-length").unwrap().to_str().unwrap(),
        manifest.len().to_string()
    );
    assert_eq!(
        headers.get("docker-content-digest").unwrap().to_str().unwrap(),
        expected_digest
    );

    // GET by digest: identical output.
    let (status, _, by_digest) = send(
        &server.router,
        "GET",
        &format!("/v2/{image}/manifests/{expected_digest}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_digest, manifest);

    // HEAD reports the mapping's current reference.
    let (status, headers, _) = send(
        &server.router,
        "HEAD",
        &format!("/v2/{image}/manifests/latest"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("docker-content-digest"));
}

#[tokio::test]
async fn manifest_records_blob_map_in_the_mapping_file() {
    let server = TestServer::new().await;
    // Keep pins from rewriting entries mid-test: the assertions below are
    // about the freshly written local shapes.
    server.backend.fail_pin.store(true, Ordering::SeqCst);
    let image = "lib/app";

    let layer_digest = push_blob(&server, image, &[b"layer-one"]).await;
    let manifest = Bytes::from(
        json!({"schemaVersion": 2, "layers": [{"digest": layer_digest, "size": 9}]}).to_string(),
    );
    let manifest_digest = Digest::compute(&manifest).to_string();

    let (status, _, _) = send(
        &server.router,
        "PUT",
        &format!("/v2/{image}/manifests/v1"),
        Some(manifest),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let doc = server.mapping_json();
    // Tag entry with a per-manifest blob table, plus the digest alias.
    assert_eq!(doc[format!("{image}:v1")]["manifest_cid"], manifest_digest);
    assert_eq!(
        doc[format!("{image}:v1")]["blobs"][&layer_digest],
        layer_digest
    );
    assert_eq!(
        doc[format!("{image}:{manifest_digest}")]["manifest_cid"],
        manifest_digest
    );
    // The blob itself is recorded under the image's blob table.
    assert_eq!(doc[image]["blobs"][&layer_digest], layer_digest);
}

#[tokio::test]
async fn empty_manifest_body_is_rejected() {
    let server = TestServer::new().await;
    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/v2/lib/app/manifests/latest",
        None,
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &server.router,
        "PUT",
        "/v2/lib/app/manifests/latest",
        Some(Bytes::from_static(b"not json")),
        Some(&auth()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_content_is_404() {
    let server = TestServer::new().await;

    let (status, _, _) = send(
        &server.router,
        "GET",
        "/v2/lib/app/manifests/latest",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let missing = Digest::compute(b"never pushed");
    let (status, _, _) = send(
        &server.router,
        "GET",
        &format!("/v2/lib/app/blobs/{missing}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_v2_paths_are_400() {
    let server = TestServer::new().await;
    let (status, _, _) = send(&server.router, "GET", "/v2/name-only", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

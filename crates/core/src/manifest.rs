//! Image manifest inspection.
//!
//! Manifests are stored and served as the verbatim wire bytes; re-serializing
//! the JSON would change the digest clients computed over the body. Parsing
//! here is therefore read-only: layer digests and the media type are pulled
//! out of the document without touching anything else.

use serde_json::Value;

/// Docker image manifest v2 schema 2 media type.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// OCI image manifest v1 media type.
pub const OCI_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";

/// Extract the layer digest list from raw manifest bytes.
///
/// Looks at `layers[*].digest` (OCI and Docker v2 schema 2), falling back to
/// `fsLayers[*].digest` for legacy manifests; anything else yields an empty
/// list. Invalid JSON is the only error.
pub fn layers_of(body: &[u8]) -> crate::Result<Vec<String>> {
    let doc: Value =
        serde_json::from_slice(body).map_err(|e| crate::Error::BadManifest(e.to_string()))?;
    Ok(layer_digests(&doc))
}

/// Extract the layer digest list from an already-parsed manifest document.
pub fn layer_digests(doc: &Value) -> Vec<String> {
    for key in ["layers", "fsLayers"] {
        if let Some(entries) = doc.get(key).and_then(Value::as_array) {
            return entries
                .iter()
                .filter_map(|entry| entry.get("digest").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

/// Resolve the response media type for a manifest document.
///
/// Clients that declared a `mediaType` get it echoed back; otherwise
/// `schemaVersion == 2` means Docker v2, and anything else is served as OCI.
pub fn media_type_of(doc: &Value) -> String {
    if let Some(declared) = doc.get("mediaType").and_then(Value::as_str) {
        return declared.to_string();
    }
    if doc.get("schemaVersion").and_then(Value::as_u64) == Some(2) {
        return DOCKER_MANIFEST_V2.to_string();
    }
    OCI_MANIFEST_V1.to_string()
}

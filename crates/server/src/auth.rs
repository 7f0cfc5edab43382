//! Credential extraction from registry authentication headers.

use crate::error::{ApiError, ApiResult};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use pincer_core::Credential;

/// Challenge sent with every 401. Docker only replays stored credentials
/// after seeing a Basic challenge on `/v2/`.
pub const CHALLENGE: &str = "Basic realm=\"pincer\"";

/// Extract a pinning credential from the Authorization header.
///
/// `Basic b64(user:pass)`: the password half is the private key, or the
/// whole decoded value when the password is empty. `Bearer t`: the token is
/// the key. Scheme matching is case-insensitive per RFC 7617/6750. Missing
/// or unparseable headers yield `None`.
pub fn extract_credential(headers: &HeaderMap) -> Option<Credential> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    if value.len() >= 6 && value[..6].eq_ignore_ascii_case("basic ") {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value[6..].trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let key = match decoded.split_once(':') {
            Some((_, pass)) if !pass.is_empty() => pass,
            _ => decoded.as_str(),
        };
        return Credential::new(key);
    }
    if value.len() >= 7 && value[..7].eq_ignore_ascii_case("bearer ") {
        return Credential::new(&value[7..]);
    }
    None
}

/// Require a credential on a write endpoint.
pub fn require_credential(headers: &HeaderMap) -> ApiResult<Credential> {
    extract_credential(headers).ok_or(ApiError::Unauthorized)
}

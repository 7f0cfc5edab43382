//! Pinning credentials extracted from registry authentication.

use std::fmt;

/// A normalized private-key credential.
///
/// The registry performs no signing; the key is an opaque identifier for
/// service caching and is forwarded verbatim to the pinning backend.
/// Normalization trims whitespace and ensures a `0x` prefix.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Normalize a raw key. Returns `None` for empty input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let key = if trimmed.starts_with("0x") {
            trimmed.to_string()
        } else {
            format!("0x{trimmed}")
        };
        Some(Self(key))
    }

    /// The normalized key, for handing to the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

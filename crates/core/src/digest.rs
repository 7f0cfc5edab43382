//! Content digests in the canonical `sha256:<hex>` form.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Canonical algorithm prefix. The registry only ever speaks SHA-256.
pub const SHA256_PREFIX: &str = "sha256:";

/// A SHA-256 content digest, serialized as `sha256:<64-lowercase-hex>`.
///
/// Equal bytes hash to equal digests; the hex form is always lowercase so
/// digest strings compare byte-for-byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Compute the digest of a byte slice.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create an incremental hasher.
    pub fn hasher() -> DigestHasher {
        DigestHasher(Sha256::new())
    }

    /// Parse the canonical string form. The hex portion is accepted in
    /// either case and normalized to lowercase.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let hex_part = s
            .strip_prefix(SHA256_PREFIX)
            .ok_or_else(|| crate::Error::InvalidDigest(format!("missing sha256: prefix: {s}")))?;
        if hex_part.len() != 64 {
            return Err(crate::Error::InvalidDigest(format!(
                "expected 64 hex chars, got {}",
                hex_part.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_part, &mut bytes)
            .map_err(|e| crate::Error::InvalidDigest(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// True when a reference string is digest-shaped rather than a tag.
    pub fn is_digest(s: &str) -> bool {
        s.starts_with(SHA256_PREFIX)
    }

    /// The lowercase hex portion, without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SHA256_PREFIX, self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

/// Incremental SHA-256 hasher for streamed content.
pub struct DigestHasher(Sha256);

impl DigestHasher {
    /// Feed more data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest {
        Digest(self.0.finalize().into())
    }
}

//! Content references: where the bytes behind a mapping entry live.

use crate::digest::{Digest, SHA256_PREFIX};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A reference to retrievable content.
///
/// Mapping values are flat strings on disk; a `sha256:` prefix marks content
/// held in the local store, anything else is a remote content id. Callers
/// must go through a resolver rather than branching on the shape themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentRef {
    /// Content available in the local store under this digest.
    Local(Digest),
    /// Content pinned remotely under this opaque content id.
    Remote(String),
}

impl ContentRef {
    /// Parse the bare string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.starts_with(SHA256_PREFIX) {
            Ok(Self::Local(Digest::parse(s)?))
        } else {
            Ok(Self::Remote(s.to_string()))
        }
    }

    /// True when the content is held locally.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(digest) => digest.fmt(f),
            Self::Remote(content_id) => f.write_str(content_id),
        }
    }
}

impl Serialize for ContentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

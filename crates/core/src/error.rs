//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("bad manifest: {0}")]
    BadManifest(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

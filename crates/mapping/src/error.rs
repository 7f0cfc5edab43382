//! Mapping index error types.

use thiserror::Error;

/// Mapping index errors.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed mapping file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("mapping file root is not a JSON object")]
    NotAnObject,
}

/// Result type for mapping operations.
pub type MappingResult<T> = std::result::Result<T, MappingError>;

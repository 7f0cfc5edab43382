//! Remote backend error types.

use thiserror::Error;

/// Errors from the pinning backend and gateway.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend request failed: {0}")]
    Request(String),

    #[error("remote fetch failed: {0}")]
    Fetch(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("CAR packing failed: {0}")]
    Pack(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for remote operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

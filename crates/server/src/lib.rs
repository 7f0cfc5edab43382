//! OCI Distribution v2 HTTP surface for pincer.
//!
//! This crate wires the push/pull state machine together:
//! - Endpoint routing and handlers (manifests, blobs, chunked uploads)
//! - Credential extraction from registry authentication
//! - The in-memory upload session table
//! - The resolver bridging local staging and the remote store
//! - The asynchronous pin pipeline that upgrades mappings in the background

pub mod auth;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod resolve;
pub mod routes;
pub mod sessions;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

//! Core domain types and shared logic for the pincer registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content digests and incremental hashing
//! - Content references (local digest vs. remote content id)
//! - Manifest layer extraction and media-type resolution
//! - Pinning credentials
//! - Configuration sections

pub mod config;
pub mod content_ref;
pub mod credential;
pub mod digest;
pub mod error;
pub mod manifest;

pub use content_ref::ContentRef;
pub use credential::Credential;
pub use digest::{Digest, DigestHasher, SHA256_PREFIX};
pub use error::{Error, Result};

//! Local content-addressed storage for the pincer registry.
//!
//! This crate persists raw bytes keyed by their digest:
//! - Blobs (layers and config objects) under `<root>/blobs/<hex>`
//! - Manifests, stored verbatim, under `<root>/manifests/<hex>`
//!
//! Writes are atomic (temp file + rename) and idempotent; files are never
//! rewritten once they exist.

pub mod error;
pub mod local;

pub use error::{StorageError, StorageResult};
pub use local::{ByteStream, LocalStore, Namespace};

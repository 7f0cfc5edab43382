//! Durable mapping index for the pincer registry.
//!
//! Maps OCI coordinates — (image, reference) for manifests, (image, digest)
//! for blobs — to content references: a local digest while content only
//! exists in the staging store, atomically swapped to the remote content id
//! once the background pin completes.
//!
//! The index is a single JSON file, rewritten whole (temp file + rename) on
//! every mutation, so readers on disk always see a consistent snapshot.

pub mod error;
pub mod store;

pub use error::{MappingError, MappingResult};
pub use store::MappingStore;

//! The pinning backend boundary.
//!
//! The registry never implements pinning itself; it consumes this narrow
//! interface. Wallets, payment rails, and proofs all live on the far side.

use crate::error::RemoteResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use pincer_core::Credential;
use serde::Deserialize;
use std::collections::HashMap;
use std::pin::Pin;

/// A boxed stream of bytes for gateway reads.
pub type RemoteByteStream = Pin<Box<dyn Stream<Item = RemoteResult<Bytes>> + Send>>;

/// Metadata attached to datasets and pinned payloads.
pub type PinMetadata = HashMap<String, String>;

/// Opaque handle to an initialized per-credential backend session.
///
/// Expensive to create (wallet bootstrap, RPC handshake); cached by the
/// service manager and reused across pushes.
#[derive(Clone, Debug)]
pub struct BaseService {
    /// Backend-assigned session identifier.
    pub id: String,
    /// Provider the backend selected for subsequent pins, when it reports one.
    pub provider: Option<String>,
}

/// Opaque handle to a dataset: the backend's container for related pins.
#[derive(Clone, Debug)]
pub struct DatasetHandle {
    /// Backend-assigned dataset identifier.
    pub id: String,
}

/// Acknowledgement of a completed pin.
#[derive(Clone, Debug, Deserialize)]
pub struct PinReceipt {
    /// Content id the payload is retrievable under.
    pub content_id: String,
}

/// Interface to the remote content-addressed store.
#[async_trait]
pub trait PinningBackend: Send + Sync + 'static {
    /// Initialize the expensive per-credential session.
    async fn initialize(&self, credential: &Credential) -> RemoteResult<BaseService>;

    /// Create a dataset grouping related pinned payloads.
    async fn create_dataset(
        &self,
        base: &BaseService,
        metadata: &PinMetadata,
    ) -> RemoteResult<DatasetHandle>;

    /// Commit a packed payload durably under its content id. May take
    /// minutes; callers must not hold request-scoped resources across it.
    async fn pin(
        &self,
        base: &BaseService,
        dataset: &DatasetHandle,
        payload: Bytes,
        content_id: &str,
        metadata: &PinMetadata,
    ) -> RemoteResult<PinReceipt>;

    /// Fetch pinned bytes by content id via the HTTP gateway.
    async fn fetch(&self, content_id: &str) -> RemoteResult<RemoteByteStream>;

    /// Release backend resources on shutdown.
    async fn teardown(&self) -> RemoteResult<()>;
}

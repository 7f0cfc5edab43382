//! Per-image remote service management.
//!
//! Pinning a layer and its manifest into the same dataset keeps an image
//! atomic from the backend's perspective: one billable unit, one lifecycle.
//! Base sessions are reused per credential so pushes don't repeat the
//! expensive wallet bootstrap.

use crate::backend::{BaseService, DatasetHandle, PinMetadata, PinningBackend};
use crate::error::RemoteResult;
use pincer_core::Credential;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A backend session bound to one image's dataset.
pub struct ImageService {
    /// Shared per-credential session.
    pub base: Arc<BaseService>,
    /// Dataset collecting every payload of this image.
    pub dataset: DatasetHandle,
}

#[derive(Default)]
struct Caches {
    base: HashMap<Credential, Arc<BaseService>>,
    image: HashMap<(Credential, String), Arc<ImageService>>,
}

/// Two-level cache of backend handles, keyed by credential and by
/// (credential, image). Entries are immutable once created and live until
/// shutdown.
pub struct ServiceManager {
    backend: Arc<dyn PinningBackend>,
    source: &'static str,
    caches: Mutex<Caches>,
}

impl ServiceManager {
    pub fn new(backend: Arc<dyn PinningBackend>) -> Self {
        Self {
            backend,
            source: "pincer",
            caches: Mutex::new(Caches::default()),
        }
    }

    /// The underlying backend, for pin and fetch calls.
    pub fn backend(&self) -> Arc<dyn PinningBackend> {
        self.backend.clone()
    }

    /// Resolve the service for (credential, image), lazily initializing the
    /// base session and provisioning the image's dataset on first use.
    pub async fn service_for(
        &self,
        credential: &Credential,
        image: &str,
    ) -> RemoteResult<Arc<ImageService>> {
        let key = (credential.clone(), image.to_string());
        let mut caches = self.caches.lock().await;
        if let Some(service) = caches.image.get(&key) {
            return Ok(service.clone());
        }

        let base = match caches.base.get(credential) {
            Some(base) => base.clone(),
            None => {
                let base = Arc::new(self.backend.initialize(credential).await?);
                caches.base.insert(credential.clone(), base.clone());
                base
            }
        };

        let mut metadata = PinMetadata::new();
        metadata.insert("type".to_string(), "oci-image".to_string());
        metadata.insert("imageName".to_string(), image.to_string());
        metadata.insert("source".to_string(), self.source.to_string());
        let dataset = self.backend.create_dataset(&base, &metadata).await?;
        tracing::info!(image = %image, dataset_id = %dataset.id, "provisioned dataset");

        let service = Arc::new(ImageService { base, dataset });
        caches.image.insert(key, service.clone());
        Ok(service)
    }

    /// Drain both caches and tear the backend down.
    pub async fn shutdown(&self) {
        {
            let mut caches = self.caches.lock().await;
            caches.image.clear();
            caches.base.clear();
        }
        if let Err(error) = self.backend.teardown().await {
            tracing::warn!(%error, "backend teardown failed");
        }
    }
}

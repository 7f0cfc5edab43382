//! Application state shared across handlers.

use crate::resolve::Resolver;
use crate::sessions::SessionTable;
use pincer_core::config::AppConfig;
use pincer_mapping::MappingStore;
use pincer_remote::{PinningBackend, ServiceManager};
use pincer_storage::LocalStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Local blob/manifest store.
    pub local: Arc<LocalStore>,
    /// Durable mapping index.
    pub mapping: Arc<MappingStore>,
    /// In-progress upload sessions.
    pub sessions: Arc<SessionTable>,
    /// Per-image remote service cache.
    pub services: Arc<ServiceManager>,
    /// Local/remote content resolver.
    pub resolver: Arc<Resolver>,
}

impl AppState {
    /// Assemble the state around a pinning backend.
    pub fn new(
        config: AppConfig,
        local: Arc<LocalStore>,
        mapping: Arc<MappingStore>,
        backend: Arc<dyn PinningBackend>,
    ) -> Self {
        let services = Arc::new(ServiceManager::new(backend.clone()));
        let resolver = Arc::new(Resolver::new(local.clone(), backend));
        Self {
            config: Arc::new(config),
            local,
            mapping,
            sessions: Arc::new(SessionTable::new()),
            services,
            resolver,
        }
    }
}

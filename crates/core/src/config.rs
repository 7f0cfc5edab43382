//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Local blob/manifest store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Mapping index settings.
    #[serde(default)]
    pub mapping: MappingConfig,
    /// Remote pinning backend settings.
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl AppConfig {
    /// Configuration for tests: defaults plus a short session idle timeout.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.server.session_idle_timeout_secs = 60;
        config
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds an upload session may sit idle before the sweep evicts it.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
}

impl ServerConfig {
    /// Idle timeout as a Duration.
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
        }
    }
}

/// Local storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the local blob/manifest store.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Mapping index configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Path to the mapping JSON file.
    #[serde(default = "default_mapping_file")]
    pub file: PathBuf,
    /// When true, a malformed existing mapping file is fatal at startup.
    /// When false (default), it is logged and replaced with an empty index.
    #[serde(default)]
    pub strict: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            file: default_mapping_file(),
            strict: false,
        }
    }
}

/// Remote pinning backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// RPC endpoint of the pinning daemon. Falls back to the backend default.
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Warm-storage contract override, forwarded opaquely to the backend.
    #[serde(default)]
    pub warm_storage_address: Option<String>,
    /// HTTP gateway used for content-id reads.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Deadline for a single gateway fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Funding page surfaced when the backend reports insufficient funds.
    #[serde(default)]
    pub funding_url: Option<String>,
}

impl RemoteConfig {
    /// Gateway fetch deadline as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            warm_storage_address: None,
            gateway_url: default_gateway_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            funding_url: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5002
}

fn default_session_idle_timeout_secs() -> u64 {
    3600
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("image_mapping.json")
}

fn default_gateway_url() -> String {
    "https://ipfs.io".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

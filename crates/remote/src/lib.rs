//! Remote pinning integration for the pincer registry.
//!
//! This crate owns everything that touches the content-addressed backend:
//! - The `PinningBackend` trait consumed by the rest of the system
//! - A thin RPC client speaking to the external pinning daemon, with
//!   gateway reads bounded by a deadline
//! - CAR packing: raw bytes to a single-block archive plus its content id
//! - The per-image service manager caching expensive backend handles

pub mod backend;
pub mod car;
pub mod error;
pub mod rpc;
pub mod services;

pub use backend::{
    BaseService, DatasetHandle, PinMetadata, PinReceipt, PinningBackend, RemoteByteStream,
};
pub use car::pack;
pub use error::{RemoteError, RemoteResult};
pub use rpc::RpcBackend;
pub use services::{ImageService, ServiceManager};

//! Server test utilities.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use base64::Engine;
use bytes::Bytes;
use pincer_core::Credential;
use pincer_core::config::AppConfig;
use pincer_mapping::MappingStore;
use pincer_remote::{
    BaseService, DatasetHandle, PinMetadata, PinReceipt, PinningBackend, RemoteByteStream,
    RemoteError, RemoteResult,
};
use pincer_server::{AppState, create_router};
use pincer_storage::LocalStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

/// A recorded pin call.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Clone)]
pub struct RecordedPin {
    pub dataset_id: String,
    pub content_id: String,
    pub payload: Bytes,
    pub metadata: PinMetadata,
}

/// In-memory pinning backend for tests: records pins, serves gateway reads
/// from a seeded object map, and can be switched to fail either path.
#[derive(Default)]
pub struct MockBackend {
    pins: Mutex<Vec<RecordedPin>>,
    gateway: Mutex<HashMap<String, Bytes>>,
    pub fail_fetch: AtomicBool,
    pub fail_pin: AtomicBool,
    pub initialized: AtomicUsize,
    pub datasets_created: AtomicUsize,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a gateway object so remote reads of `content_id` succeed.
    pub async fn put_gateway_object(&self, content_id: &str, data: Bytes) {
        self.gateway.lock().await.insert(content_id.to_string(), data);
    }

    pub async fn recorded_pins(&self) -> Vec<RecordedPin> {
        self.pins.lock().await.clone()
    }
}

#[async_trait]
impl PinningBackend for MockBackend {
    async fn initialize(&self, credential: &Credential) -> RemoteResult<BaseService> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(BaseService {
            id: format!("base-{}", credential.as_str().len()),
            provider: Some("mock-provider".to_string()),
        })
    }

    async fn create_dataset(
        &self,
        _base: &BaseService,
        _metadata: &PinMetadata,
    ) -> RemoteResult<DatasetHandle> {
        self.datasets_created.fetch_add(1, Ordering::SeqCst);
        Ok(DatasetHandle {
            id: Uuid::new_v4().to_string(),
        })
    }

    async fn pin(
        &self,
        _base: &BaseService,
        dataset: &DatasetHandle,
        payload: Bytes,
        content_id: &str,
        metadata: &PinMetadata,
    ) -> RemoteResult<PinReceipt> {
        if self.fail_pin.load(Ordering::SeqCst) {
            return Err(RemoteError::Request("pin disabled by test".to_string()));
        }
        // Pinned content becomes fetchable, like on a real gateway.
        self.gateway
            .lock()
            .await
            .insert(content_id.to_string(), extract_car_block(&payload));
        self.pins.lock().await.push(RecordedPin {
            dataset_id: dataset.id.clone(),
            content_id: content_id.to_string(),
            payload,
            metadata: metadata.clone(),
        });
        Ok(PinReceipt {
            content_id: content_id.to_string(),
        })
    }

    async fn fetch(&self, content_id: &str) -> RemoteResult<RemoteByteStream> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Fetch("gateway unreachable".to_string()));
        }
        let data = self
            .gateway
            .lock()
            .await
            .get(content_id)
            .cloned()
            .ok_or_else(|| RemoteError::Fetch(format!("no such object: {content_id}")))?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<Bytes, RemoteError>(data)
        })))
    }

    async fn teardown(&self) -> RemoteResult<()> {
        Ok(())
    }
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    pub backend: Arc<MockBackend>,
    pub mapping_path: PathBuf,
    pub storage_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let local = Arc::new(
            LocalStore::new(&storage_path)
                .await
                .expect("Failed to create local store"),
        );

        let mapping_path = temp_dir.path().join("image_mapping.json");
        let mapping = Arc::new(
            MappingStore::load(&mapping_path, false)
                .await
                .expect("Failed to load mapping store"),
        );

        let backend = Arc::new(MockBackend::new());
        let state = AppState::new(AppConfig::for_testing(), local, mapping, backend.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            backend,
            mapping_path,
            storage_path,
            _temp_dir: temp_dir,
        }
    }

    /// The mapping file as parsed JSON.
    pub fn mapping_json(&self) -> serde_json::Value {
        let raw = std::fs::read(&self.mapping_path).expect("mapping file missing");
        serde_json::from_slice(&raw).expect("mapping file is not valid JSON")
    }
}

/// Pull the raw block data out of a single-block CARv1 payload, so the mock
/// gateway serves what a real gateway would.
fn extract_car_block(payload: &[u8]) -> Bytes {
    let (header_len, rest) = read_varint(payload);
    let rest = &rest[header_len as usize..];
    let (block_len, rest) = read_varint(rest);
    let block = &rest[..block_len as usize];
    // CIDv1 raw sha2-256: 4 prefix bytes + 32 digest bytes.
    assert_eq!(&block[..2], &[0x01, 0x55], "unexpected CID prefix");
    Bytes::copy_from_slice(&block[36..])
}

fn read_varint(buf: &[u8]) -> (u64, &[u8]) {
    let mut value = 0u64;
    let mut shift = 0;
    for (i, byte) in buf.iter().enumerate() {
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return (value, &buf[i + 1..]);
        }
        shift += 7;
    }
    panic!("truncated varint in CAR payload");
}

/// A Basic Authorization header for the given key.
#[allow(dead_code)]
pub fn basic_auth(key: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("user:{key}"))
    )
}

/// Send one request through the router and collect the response.
#[allow(dead_code)]
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Bytes>,
    auth: Option<&str>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let body = match body {
        Some(data) => Body::from(data),
        None => Body::empty(),
    };
    let request = builder.body(body).expect("failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, headers, body)
}

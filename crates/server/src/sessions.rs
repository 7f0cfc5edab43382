//! In-memory chunked upload sessions.

use crate::error::{ApiError, ApiResult};
use bytes::{Bytes, BytesMut};
use pincer_core::Digest;
use pincer_storage::LocalStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How often the eviction sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One in-progress chunked blob upload. Owned exclusively by the table; the
/// OCI protocol serializes PATCH/PUT per upload id on the client side.
struct UploadSession {
    image: String,
    chunks: Vec<Bytes>,
    size: u64,
    last_active: Instant,
}

/// The result of a finalized upload, handed to the pin pipeline.
#[derive(Debug)]
pub struct FinalizedUpload {
    pub image: String,
    pub digest: Digest,
    pub data: Bytes,
}

/// Concurrent table of in-progress uploads.
///
/// Sessions buffer the whole blob in memory and do not survive a process
/// restart; clients retry the upload.
#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<Uuid, UploadSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session for an image, returning its upload id.
    pub async fn start(&self, image: &str) -> Uuid {
        let upload_id = Uuid::new_v4();
        self.sessions.lock().await.insert(
            upload_id,
            UploadSession {
                image: image.to_string(),
                chunks: Vec::new(),
                size: 0,
                last_active: Instant::now(),
            },
        );
        upload_id
    }

    /// Append a chunk, returning the new total size.
    pub async fn append(&self, upload_id: Uuid, chunk: Bytes) -> ApiResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&upload_id)
            .ok_or(ApiError::UnknownUpload(upload_id))?;
        session.size += chunk.len() as u64;
        session.chunks.push(chunk);
        session.last_active = Instant::now();
        Ok(session.size)
    }

    /// Concatenate the buffered chunks, verify the declared digest, persist
    /// the blob, and drop the session.
    ///
    /// A digest mismatch leaves the session intact so the client can retry
    /// the PUT with the right digest.
    pub async fn finalize(
        &self,
        upload_id: Uuid,
        expected: Option<&Digest>,
        store: &LocalStore,
    ) -> ApiResult<FinalizedUpload> {
        let (image, data) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(&upload_id)
                .ok_or(ApiError::UnknownUpload(upload_id))?;
            session.last_active = Instant::now();
            let mut buf = BytesMut::with_capacity(session.size as usize);
            for chunk in &session.chunks {
                buf.extend_from_slice(chunk);
            }
            (session.image.clone(), buf.freeze())
        };

        let digest = Digest::compute(&data);
        if let Some(expected) = expected
            && *expected != digest
        {
            return Err(ApiError::DigestMismatch {
                expected: expected.to_string(),
                actual: digest.to_string(),
            });
        }

        store.put_blob(&digest, data.clone()).await?;
        self.sessions.lock().await.remove(&upload_id);

        Ok(FinalizedUpload {
            image,
            digest,
            data,
        })
    }

    /// Drop sessions idle longer than `timeout`, returning how many fell.
    pub async fn evict_idle(&self, timeout: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_active.elapsed() < timeout);
        before - sessions.len()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Spawn the periodic idle-session sweep.
pub fn spawn_eviction_task(table: Arc<SessionTable>, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            let evicted = table.evict_idle(timeout).await;
            if evicted > 0 {
                tracing::info!(evicted, "evicted idle upload sessions");
            }
        }
    })
}

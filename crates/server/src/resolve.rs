//! Content resolution across the local and remote stores.
//!
//! The single place that encodes the "local-first while the remote pin is
//! still propagating" policy. Callers hand over a mapping value and never
//! branch on its shape.

use crate::error::{ApiError, ApiResult};
use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};
use pincer_core::{ContentRef, Digest};
use pincer_remote::{PinningBackend, RemoteError};
use pincer_storage::{LocalStore, Namespace, StorageError};
use std::pin::Pin;
use std::sync::Arc;

/// A boxed stream suitable for an HTTP response body.
pub type ContentStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, Box<dyn std::error::Error + Send + Sync>>> + Send>>;

/// Dispatches content references to the local store or the remote gateway.
pub struct Resolver {
    local: Arc<LocalStore>,
    backend: Arc<dyn PinningBackend>,
}

impl Resolver {
    pub fn new(local: Arc<LocalStore>, backend: Arc<dyn PinningBackend>) -> Self {
        Self { local, backend }
    }

    /// Fetch the full content behind a mapping value.
    ///
    /// Local refs read the staging store directly. Remote refs try the
    /// gateway (bounded by the backend's fetch deadline) and degrade to the
    /// local fallback digest on any remote failure; only a miss on both
    /// sides surfaces as not-found.
    pub async fn fetch(
        &self,
        content_ref: &ContentRef,
        fallback: Option<&Digest>,
        namespace: Namespace,
    ) -> ApiResult<Bytes> {
        match content_ref {
            ContentRef::Local(digest) => Ok(self.local.get(namespace, digest).await?),
            ContentRef::Remote(content_id) => match self.fetch_remote(content_id).await {
                Ok(data) => Ok(data),
                Err(error) => {
                    tracing::warn!(content_id = %content_id, %error, "remote fetch failed, trying local fallback");
                    self.local_fallback(content_id, fallback, namespace).await
                }
            },
        }
    }

    /// Open a streaming reader for the content behind a mapping value.
    ///
    /// The remote-or-fallback decision is made before the first body byte;
    /// a failure mid-stream aborts the response.
    pub async fn open(
        &self,
        content_ref: &ContentRef,
        fallback: Option<&Digest>,
        namespace: Namespace,
    ) -> ApiResult<ContentStream> {
        match content_ref {
            ContentRef::Local(digest) => Ok(boxed(self.local.stream(namespace, digest).await?)),
            ContentRef::Remote(content_id) => match self.backend.fetch(content_id).await {
                Ok(stream) => Ok(boxed(stream)),
                Err(error) => {
                    tracing::warn!(content_id = %content_id, %error, "remote fetch failed, trying local fallback");
                    let digest = self.fallback_digest(content_id, fallback, namespace).await?;
                    Ok(boxed(self.local.stream(namespace, &digest).await?))
                }
            },
        }
    }

    async fn fetch_remote(&self, content_id: &str) -> Result<Bytes, RemoteError> {
        let mut stream = self.backend.fetch(content_id).await?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    async fn local_fallback(
        &self,
        content_id: &str,
        fallback: Option<&Digest>,
        namespace: Namespace,
    ) -> ApiResult<Bytes> {
        let digest = self.fallback_digest(content_id, fallback, namespace).await?;
        Ok(self.local.get(namespace, &digest).await?)
    }

    /// The fallback digest, if the local store actually holds it.
    async fn fallback_digest(
        &self,
        content_id: &str,
        fallback: Option<&Digest>,
        namespace: Namespace,
    ) -> ApiResult<Digest> {
        let not_found = || ApiError::NotFound(format!("content {content_id} unavailable"));
        let digest = fallback.ok_or_else(not_found)?;
        match self.local.contains(namespace, digest).await {
            Ok(true) => Ok(*digest),
            Ok(false) => Err(not_found()),
            Err(StorageError::NotFound(_)) => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

fn boxed<S, E>(stream: S) -> ContentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    Box::pin(stream.map_err(Into::into))
}

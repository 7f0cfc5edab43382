//! Digest-keyed local store for blobs and manifests.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use futures::Stream;
use pincer_core::Digest;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Content namespaces within the store. Manifests live apart from blobs so
/// the two digest spaces can never shadow each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Blobs,
    Manifests,
}

impl Namespace {
    fn dir(self) -> &'static str {
        match self {
            Self::Blobs => "blobs",
            Self::Manifests => "manifests",
        }
    }
}

/// Local filesystem store addressing content by digest.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a new store, making both namespace directories.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(Namespace::Blobs.dir())).await?;
        fs::create_dir_all(root.join(Namespace::Manifests.dir())).await?;
        Ok(Self { root })
    }

    fn path(&self, namespace: Namespace, digest: &Digest) -> PathBuf {
        self.root.join(namespace.dir()).join(digest.to_hex())
    }

    /// Persist a blob under its digest.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn put_blob(&self, digest: &Digest, data: Bytes) -> StorageResult<()> {
        self.write(Namespace::Blobs, digest, data).await
    }

    /// Persist manifest bytes verbatim, returning their digest.
    ///
    /// The bytes are never re-serialized: the returned digest is exactly what
    /// a client computes over the wire body.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save_manifest(&self, data: Bytes) -> StorageResult<Digest> {
        let digest = Digest::compute(&data);
        self.write(Namespace::Manifests, &digest, data).await?;
        Ok(digest)
    }

    /// Atomic write via temp file + rename. Re-writing an existing digest is
    /// a no-op: the file name is the content hash, so the bytes cannot differ.
    async fn write(&self, namespace: Namespace, digest: &Digest, data: Bytes) -> StorageResult<()> {
        let path = self.path(namespace, digest);
        if fs::try_exists(&path).await? {
            return Ok(());
        }
        let temp_path = path.with_file_name(format!("{}.tmp.{}", digest.to_hex(), Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    /// Read full content.
    #[instrument(skip(self))]
    pub async fn get(&self, namespace: Namespace, digest: &Digest) -> StorageResult<Bytes> {
        let path = self.path(namespace, digest);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(digest.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    /// Open a streaming reader.
    #[instrument(skip(self))]
    pub async fn stream(&self, namespace: Namespace, digest: &Digest) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.path(namespace, digest);
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(digest.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    /// Check whether content is present.
    pub async fn contains(&self, namespace: Namespace, digest: &Digest) -> StorageResult<bool> {
        fs::try_exists(self.path(namespace, digest))
            .await
            .map_err(StorageError::Io)
    }
}

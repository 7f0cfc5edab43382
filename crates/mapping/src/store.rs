//! The mapping store: one JSON document, one mutex, whole-file persists.

use crate::error::{MappingError, MappingResult};
use pincer_core::{ContentRef, Digest};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Durable index from OCI coordinates to content references.
///
/// The on-disk document admits several shapes per key, all of which are
/// recognized on lookup:
///
/// ```json
/// {
///   "img:tag": "<contentRef>",
///   "img:tag2": { "manifest_cid": "<contentRef>", "blobs": { "<digest>": "<contentRef>" } },
///   "img": { "tag3": "<contentRef>", "blobs": { "<digest>": "<contentRef>" } },
///   "blobs": { "<digest>": "<contentRef>" }
/// }
/// ```
///
/// Writers produce the direct `"img:ref"` form; the nested and global-pool
/// forms exist for compatibility with mapping files written by other tools.
/// Unknown top-level keys survive rewrites untouched.
pub struct MappingStore {
    path: PathBuf,
    // Guards the in-memory document and serializes persists: mutators hold
    // the lock across both the edit and the rename.
    doc: Mutex<Map<String, Value>>,
}

impl MappingStore {
    /// Load the index from disk, starting empty when the file is absent.
    ///
    /// A malformed file is fatal in strict mode; otherwise it is logged and
    /// replaced with an empty index on the next persist.
    pub async fn load(path: impl AsRef<Path>, strict: bool) -> MappingResult<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    if strict {
                        return Err(MappingError::NotAnObject);
                    }
                    tracing::warn!(path = %path.display(), "mapping file root is not an object, starting empty");
                    Map::new()
                }
                Err(e) => {
                    if strict {
                        return Err(e.into());
                    }
                    tracing::warn!(path = %path.display(), error = %e, "malformed mapping file, starting empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Look up the manifest reference for (image, reference).
    ///
    /// Resolution order: the direct `"image:reference"` key (string or
    /// object form), then the nested `image` object, then — for
    /// digest-shaped references — a scan of the image's direct keys for a
    /// matching manifest value.
    pub async fn lookup_manifest(&self, image: &str, reference: &str) -> Option<ContentRef> {
        let doc = self.doc.lock().await;

        let direct = format!("{image}:{reference}");
        if let Some(found) = doc.get(&direct).and_then(manifest_ref_of) {
            return Some(found);
        }

        if let Some(found) = doc
            .get(image)
            .and_then(Value::as_object)
            .and_then(|nested| nested.get(reference))
            .and_then(manifest_ref_of)
        {
            return Some(found);
        }

        if Digest::is_digest(reference) {
            let prefix = format!("{image}:");
            for (key, value) in doc.iter() {
                if !key.starts_with(&prefix) {
                    continue;
                }
                if let Some(found) = manifest_ref_of(value)
                    && found.to_string() == reference
                {
                    return Some(found);
                }
            }
        }

        None
    }

    /// Look up the content reference for a blob: the image's own blob table
    /// first, then the global blob pool.
    pub async fn lookup_blob(&self, image: &str, digest: &Digest) -> Option<ContentRef> {
        let doc = self.doc.lock().await;
        let key = digest.to_string();

        let image_entry = doc
            .get(image)
            .and_then(Value::as_object)
            .and_then(|nested| nested.get("blobs"))
            .and_then(Value::as_object)
            .and_then(|blobs| blobs.get(&key))
            .and_then(content_ref_of);
        if image_entry.is_some() {
            return image_entry;
        }

        doc.get("blobs")
            .and_then(Value::as_object)
            .and_then(|blobs| blobs.get(&key))
            .and_then(content_ref_of)
    }

    /// Record a freshly committed blob as a local entry in the image's blob
    /// table.
    pub async fn record_blob(&self, image: &str, digest: &Digest) -> MappingResult<()> {
        let mut doc = self.doc.lock().await;
        image_blobs_mut(&mut doc, image)
            .insert(digest.to_string(), Value::String(digest.to_string()));
        self.persist(&doc).await
    }

    /// Record a manifest under (image, reference): a bare string when the
    /// blob map is empty, otherwise the `{manifest_cid, blobs}` object.
    pub async fn add_manifest(
        &self,
        image: &str,
        reference: &str,
        content_ref: &ContentRef,
        blobs: &[(Digest, ContentRef)],
    ) -> MappingResult<()> {
        let mut doc = self.doc.lock().await;
        let value = if blobs.is_empty() {
            Value::String(content_ref.to_string())
        } else {
            let mut blob_map = Map::new();
            for (digest, blob_ref) in blobs {
                blob_map.insert(digest.to_string(), Value::String(blob_ref.to_string()));
            }
            let mut entry = Map::new();
            entry.insert(
                "manifest_cid".to_string(),
                Value::String(content_ref.to_string()),
            );
            entry.insert("blobs".to_string(), Value::Object(blob_map));
            Value::Object(entry)
        };
        doc.insert(format!("{image}:{reference}"), value);
        self.persist(&doc).await
    }

    /// Rewrite a blob entry after a completed remote pin.
    pub async fn set_blob_ref(
        &self,
        image: &str,
        digest: &Digest,
        content_ref: &ContentRef,
    ) -> MappingResult<()> {
        let mut doc = self.doc.lock().await;
        image_blobs_mut(&mut doc, image)
            .insert(digest.to_string(), Value::String(content_ref.to_string()));
        self.persist(&doc).await
    }

    /// Rewrite a manifest entry after a completed remote pin, preserving its
    /// blob table. A vanished entry is left alone.
    pub async fn set_manifest_ref(
        &self,
        image: &str,
        reference: &str,
        content_ref: &ContentRef,
    ) -> MappingResult<()> {
        let mut doc = self.doc.lock().await;
        match doc.get_mut(&format!("{image}:{reference}")) {
            Some(Value::String(value)) => *value = content_ref.to_string(),
            Some(Value::Object(entry)) => {
                entry.insert(
                    "manifest_cid".to_string(),
                    Value::String(content_ref.to_string()),
                );
            }
            _ => return Ok(()),
        }
        self.persist(&doc).await
    }

    /// Whole-file atomic persist: temp file + fsync + rename.
    async fn persist(&self, doc: &Map<String, Value>) -> MappingResult<()> {
        let data = serde_json::to_vec_pretty(doc)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        let temp_path = self.path.with_file_name(
            self.path
                .file_name()
                .map(|name| format!("{}{}", name.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        );
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

/// Interpret a mapping value as a manifest reference: a bare string, or an
/// object carrying `manifest_cid`.
fn manifest_ref_of(value: &Value) -> Option<ContentRef> {
    match value {
        Value::String(s) => ContentRef::parse(s).ok(),
        Value::Object(entry) => entry
            .get("manifest_cid")
            .and_then(Value::as_str)
            .and_then(|s| ContentRef::parse(s).ok()),
        _ => None,
    }
}

fn content_ref_of(value: &Value) -> Option<ContentRef> {
    value.as_str().and_then(|s| ContentRef::parse(s).ok())
}

/// The image's `blobs` table, created on demand.
fn image_blobs_mut<'a>(doc: &'a mut Map<String, Value>, image: &str) -> &'a mut Map<String, Value> {
    let entry = doc
        .entry(image.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    let blobs = match entry {
        Value::Object(nested) => nested
            .entry("blobs".to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        _ => unreachable!("entry was just made an object"),
    };
    if !blobs.is_object() {
        *blobs = Value::Object(Map::new());
    }
    match blobs {
        Value::Object(map) => map,
        _ => unreachable!("blobs was just made an object"),
    }
}

//! Asynchronous remote-upload pipeline.
//!
//! An OCI write is acknowledged on local durability alone; the remote pin
//! runs on a detached task afterwards and only ever upgrades the mapping.
//! The task captures plain data (bytes, names, credential) and never touches
//! request-scoped resources.

use crate::state::AppState;
use bytes::Bytes;
use pincer_core::{ContentRef, Credential, Digest};
use pincer_remote::{PinMetadata, RemoteError, car};

/// What a pin corresponds to in the mapping.
pub enum PinTarget {
    /// A blob entry in the image's blob table.
    Blob { digest: Digest },
    /// A manifest entry, possibly recorded under several references
    /// (the tag plus its digest alias).
    Manifest {
        digest: Digest,
        references: Vec<String>,
    },
}

/// Schedule the remote pin for freshly accepted content.
///
/// Packing is synchronous and fast; a pack failure is logged and the mapping
/// simply stays at the local digest, served locally indefinitely.
pub fn schedule_pin(
    state: &AppState,
    credential: Credential,
    image: String,
    target: PinTarget,
    data: Bytes,
) {
    let (payload, content_id) = match car::pack(&data) {
        Ok(packed) => packed,
        Err(error) => {
            tracing::error!(image = %image, %error, "failed to pack payload, content stays local");
            return;
        }
    };

    let services = state.services.clone();
    let mapping = state.mapping.clone();
    let funding_url = state.config.remote.funding_url.clone();

    tokio::spawn(async move {
        let service = match services.service_for(&credential, &image).await {
            Ok(service) => service,
            Err(error) => {
                log_pin_failure(&error, &image, &content_id, funding_url.as_deref());
                return;
            }
        };

        let mut metadata = PinMetadata::new();
        metadata.insert("image".to_string(), image.clone());
        let digest = match &target {
            PinTarget::Blob { digest } => digest,
            PinTarget::Manifest { digest, .. } => digest,
        };
        metadata.insert("digest".to_string(), digest.to_string());

        let backend = services.backend();
        let receipt = match backend
            .pin(
                &service.base,
                &service.dataset,
                payload,
                &content_id,
                &metadata,
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(error) => {
                log_pin_failure(&error, &image, &content_id, funding_url.as_deref());
                return;
            }
        };

        let remote = ContentRef::Remote(receipt.content_id.clone());
        let rewritten = match &target {
            PinTarget::Blob { digest } => mapping.set_blob_ref(&image, digest, &remote).await,
            PinTarget::Manifest { references, .. } => {
                let mut result = Ok(());
                for reference in references {
                    result = result.and(mapping.set_manifest_ref(&image, reference, &remote).await);
                }
                result
            }
        };

        match rewritten {
            Ok(()) => {
                tracing::info!(
                    image = %image,
                    content_id = %receipt.content_id,
                    "remote pin complete, mapping upgraded"
                );
            }
            Err(error) => {
                tracing::error!(
                    image = %image,
                    content_id = %receipt.content_id,
                    %error,
                    "pinned remotely but failed to rewrite mapping"
                );
            }
        }
    });
}

fn log_pin_failure(error: &RemoteError, image: &str, content_id: &str, funding_url: Option<&str>) {
    if matches!(error, RemoteError::InsufficientFunds(_)) {
        tracing::error!(
            image = %image,
            content_id = %content_id,
            %error,
            funding_url = funding_url.unwrap_or("<unset>"),
            "remote pin failed: wallet needs funding"
        );
    } else {
        tracing::error!(
            image = %image,
            content_id = %content_id,
            %error,
            "remote pin failed, content stays local"
        );
    }
}

//! HTTP client for the external pinning daemon and its gateway.

use crate::backend::{
    BaseService, DatasetHandle, PinMetadata, PinReceipt, PinningBackend, RemoteByteStream,
};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use pincer_core::Credential;
use pincer_core::config::RemoteConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default RPC endpoint of the pinning daemon.
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:4005";

/// Thin JSON client for the pinning daemon.
///
/// Session and dataset creation are quick control-plane calls; pins can take
/// minutes and run without a client-side deadline. Only gateway reads are
/// bounded, because the resolver must fall back to local content promptly.
pub struct RpcBackend {
    http: reqwest::Client,
    rpc_url: String,
    warm_storage_address: Option<String>,
    gateway_url: String,
    fetch_timeout: Duration,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    private_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    warm_storage_address: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: String,
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Deserialize)]
struct CreateDatasetResponse {
    dataset_id: String,
}

impl RpcBackend {
    /// Build the client from configuration.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            rpc_url: config
                .rpc_url
                .clone()
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            warm_storage_address: config.warm_storage_address.clone(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            fetch_timeout: config.fetch_timeout(),
        })
    }

    /// Surface non-success responses, mapping payment failures to their own
    /// variant so the pipeline can log a funding hint.
    async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::PAYMENT_REQUIRED
            || body.to_ascii_lowercase().contains("insufficient funds")
        {
            return Err(RemoteError::InsufficientFunds(body));
        }
        Err(RemoteError::Request(format!("{status}: {body}")))
    }
}

#[async_trait]
impl PinningBackend for RpcBackend {
    async fn initialize(&self, credential: &Credential) -> RemoteResult<BaseService> {
        let url = format!("{}/v1/sessions", self.rpc_url);
        let request = CreateSessionRequest {
            private_key: credential.as_str(),
            warm_storage_address: self.warm_storage_address.as_deref(),
        };
        let response = Self::check(self.http.post(&url).json(&request).send().await?).await?;
        let session: CreateSessionResponse = response.json().await?;
        tracing::debug!(session_id = %session.session_id, "backend session initialized");
        Ok(BaseService {
            id: session.session_id,
            provider: session.provider,
        })
    }

    async fn create_dataset(
        &self,
        base: &BaseService,
        metadata: &PinMetadata,
    ) -> RemoteResult<DatasetHandle> {
        let url = format!("{}/v1/sessions/{}/datasets", self.rpc_url, base.id);
        let response = Self::check(self.http.post(&url).json(metadata).send().await?).await?;
        let dataset: CreateDatasetResponse = response.json().await?;
        tracing::debug!(dataset_id = %dataset.dataset_id, "dataset created");
        Ok(DatasetHandle {
            id: dataset.dataset_id,
        })
    }

    async fn pin(
        &self,
        base: &BaseService,
        dataset: &DatasetHandle,
        payload: Bytes,
        content_id: &str,
        metadata: &PinMetadata,
    ) -> RemoteResult<PinReceipt> {
        let url = format!(
            "{}/v1/sessions/{}/datasets/{}/pins/{}",
            self.rpc_url, base.id, dataset.id, content_id
        );
        let pairs: Vec<(&str, &str)> = metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let response = Self::check(
            self.http
                .post(&url)
                .query(&pairs)
                .header(reqwest::header::CONTENT_TYPE, "application/vnd.ipld.car")
                .body(payload)
                .send()
                .await?,
        )
        .await?;
        let receipt: PinReceipt = response.json().await?;
        Ok(receipt)
    }

    async fn fetch(&self, content_id: &str) -> RemoteResult<RemoteByteStream> {
        let url = format!("{}/ipfs/{}", self.gateway_url, content_id);
        let response = self
            .http
            .get(&url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| RemoteError::Fetch(e.to_string()));
        Ok(Box::pin(stream))
    }

    async fn teardown(&self) -> RemoteResult<()> {
        let url = format!("{}/v1/teardown", self.rpc_url);
        // Best-effort: a dead daemon at shutdown is not worth an error.
        match self.http.post(&url).send().await {
            Ok(_) => Ok(()),
            Err(error) => {
                tracing::debug!(%error, "backend teardown request failed");
                Ok(())
            }
        }
    }
}

// libs/media-cell/src/services/object_store.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, error, info};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob storage is not configured")]
    NotConfigured,

    #[error("Blob request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob storage error: {0}")]
    Api(String),

    #[error("Invalid blob container URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored under `path`.
    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StorageError>;

    /// Address of the object without credentials.
    fn object_url(&self, path: &str) -> String;
}

/// Azure Blob Storage container addressed by URL and authorised with a SAS token.
/// Based on: https://learn.microsoft.com/rest/api/storageservices/put-blob
pub struct AzureBlobStore {
    client: Client,
    container_url: Url,
    sas_token: String,
}

impl AzureBlobStore {
    pub fn new(config: &AppConfig) -> Result<Self, StorageError> {
        if !config.is_blob_storage_configured() {
            return Err(StorageError::NotConfigured);
        }

        let raw = config.azure_blob_container_url.trim_end_matches('/');
        let container_url = Url::parse(raw).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if container_url.cannot_be_a_base() || !matches!(container_url.scheme(), "http" | "https") {
            return Err(StorageError::InvalidUrl(raw.to_string()));
        }

        Ok(Self {
            client: Client::new(),
            container_url,
            sas_token: config.azure_blob_sas_token.trim_start_matches('?').to_string(),
        })
    }

    /// Appends each path segment percent-encoded, so names never spill into
    /// the query or fragment.
    fn blob_url(&self, path: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    fn signed_url(&self, path: &str) -> Url {
        let mut url = self.blob_url(path);
        if !self.sas_token.is_empty() {
            url.set_query(Some(&self.sas_token));
        }
        url
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let size = bytes.len();
        let response = self
            .client
            .put(self.signed_url(path))
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Blob upload of {} failed: {} - {}", path, status, body);
            return Err(StorageError::Api(format!("HTTP {}: {}", status, body)));
        }

        info!("Stored blob {} ({} bytes)", path, size);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<StoredObject>, StorageError> {
        let response = self.client.get(self.signed_url(path)).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Blob {} not found", path);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Blob download of {} failed: {} - {}", path, status, body);
            return Err(StorageError::Api(format!("HTTP {}: {}", status, body)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(Some(StoredObject { bytes, content_type }))
    }

    fn object_url(&self, path: &str) -> String {
        self.blob_url(path).to_string()
    }
}

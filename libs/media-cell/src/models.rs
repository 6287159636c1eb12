use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use queue_cell::services::AgentError;
use shared_database::DbError;
use shared_models::error::AppError;

use crate::services::object_store::StorageError;

// ==============================================================================
// IMAGES
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    #[serde(default)]
    pub image_data: String,
    pub encounter_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub image_path: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];

        if bytes.starts_with(PNG) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(JPEG) {
            Some(ImageKind::Jpeg)
        } else {
            None
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
        }
    }
}

// ==============================================================================
// VALIDATION
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub queue_id: Uuid,
    pub image_path: String,
    pub validation_result: Value,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotFound(_) => AppError::NotFound(err.to_string()),
            MediaError::ValidationError(msg) => AppError::ValidationError(msg),
            MediaError::Storage(StorageError::NotConfigured) => AppError::Internal(err.to_string()),
            MediaError::Storage(e) => AppError::ExternalService(e.to_string()),
            MediaError::Agent(e) => e.into(),
            MediaError::Database(e) => e.into(),
        }
    }
}

impl From<AppError> for MediaError {
    fn from(err: AppError) -> Self {
        MediaError::ValidationError(match err {
            AppError::ValidationError(msg) | AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        })
    }
}

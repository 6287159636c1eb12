use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::{DbError, QueueRecord};
use shared_models::error::AppError;
use shared_models::status::QueueStatus;

use crate::services::agent::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub queue_id: Uuid,
    pub encounter_id: String,
    pub emr_id: Option<String>,
    pub status: String,
    pub raw_payload: Option<Value>,
    pub parsed_payload: Option<Value>,
    pub validation_result: Option<Value>,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QueueRecord> for QueueEntry {
    fn from(row: QueueRecord) -> Self {
        Self {
            queue_id: row.queue_id,
            encounter_id: row.encounter_id,
            emr_id: row.emr_id,
            status: row.status,
            raw_payload: row.raw_payload,
            parsed_payload: row.parsed_payload,
            validation_result: row.validation_result,
            attempts: row.attempts,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListQuery {
    pub status: Option<String>,
    pub emr_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueList {
    pub entries: Vec<QueueEntry>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQueueStatusRequest {
    #[serde(default)]
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue entry {0} not found")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: QueueStatus, to: QueueStatus },

    #[error("Queue entry {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("Queue entry {0} is already DONE")]
    AlreadyDone(Uuid),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => AppError::NotFound(err.to_string()),
            QueueError::InvalidTransition { .. } | QueueError::AlreadyDone(_) => {
                AppError::BadRequest(err.to_string())
            }
            QueueError::Conflict(_) => AppError::Conflict(err.to_string()),
            QueueError::ValidationError(msg) => AppError::ValidationError(msg),
            QueueError::Agent(e) => e.into(),
            QueueError::Database(e) => e.into(),
        }
    }
}

impl From<AppError> for QueueError {
    fn from(err: AppError) -> Self {
        QueueError::ValidationError(match err {
            AppError::ValidationError(msg) | AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        })
    }
}

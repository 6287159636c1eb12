use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::{DbError, EncounterRecord};
use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: Uuid,
    pub encounter_id: String,
    pub emr_id: String,
    pub encounter_payload: Value,
    pub trace_id: Option<String>,
    pub chief_complaints: Option<Value>,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EncounterRecord> for Encounter {
    fn from(row: EncounterRecord) -> Self {
        Self {
            id: row.id,
            encounter_id: row.encounter_id,
            emr_id: row.emr_id,
            encounter_payload: row.encounter_payload,
            trace_id: row.trace_id,
            chief_complaints: row.chief_complaints,
            status: row.status,
            created_by: row.created_by,
            started_at: row.started_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertEncounterRequest {
    #[serde(default)]
    pub encounter_id: String,
    #[serde(default)]
    pub emr_id: String,
    pub encounter_payload: Option<Value>,
    pub trace_id: Option<String>,
    pub chief_complaints: Option<Value>,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterListQuery {
    pub emr_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EncounterList {
    pub encounters: Vec<Encounter>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum EncounterError {
    #[error("Encounter {0} not found")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<EncounterError> for AppError {
    fn from(err: EncounterError) -> Self {
        match err {
            EncounterError::NotFound(_) => AppError::NotFound(err.to_string()),
            EncounterError::ValidationError(msg) => AppError::ValidationError(msg),
            EncounterError::Database(e) => e.into(),
        }
    }
}

impl From<AppError> for EncounterError {
    fn from(err: AppError) -> Self {
        EncounterError::ValidationError(match err {
            AppError::ValidationError(msg) | AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        })
    }
}

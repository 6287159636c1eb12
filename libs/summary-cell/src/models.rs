use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_database::{DbError, SummaryRecord};
use shared_models::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: i64,
    pub emr_id: String,
    pub encounter_id: Option<String>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SummaryRecord> for Summary {
    fn from(row: SummaryRecord) -> Self {
        Self {
            id: row.id,
            emr_id: row.emr_id,
            encounter_id: row.encounter_id,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSummaryRequest {
    #[serde(default)]
    pub emr_id: String,
    pub encounter_id: Option<String>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryListQuery {
    pub emr_id: Option<String>,
    pub encounter_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SummaryList {
    pub summaries: Vec<Summary>,
    pub total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Summary {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Invalid(#[from] AppError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<SummaryError> for AppError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::NotFound(_) => AppError::NotFound(err.to_string()),
            SummaryError::Invalid(e) => e,
            SummaryError::Database(e) => e.into(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_database::{DbError, PatientRecord, PendingPatientRecord};
use shared_models::error::AppError;

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: i64,
    pub emr_id: String,
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub dob: Option<String>,
    pub mobile_phone: Option<String>,
    pub sex_at_birth: Option<String>,
    pub reason_for_visit: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub status: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PatientRecord> for Patient {
    fn from(row: PatientRecord) -> Self {
        Self {
            id: row.id,
            emr_id: row.emr_id,
            booking_id: row.booking_id,
            booking_number: row.booking_number,
            patient_number: row.patient_number,
            legal_first_name: row.legal_first_name,
            legal_last_name: row.legal_last_name,
            dob: row.dob,
            mobile_phone: row.mobile_phone,
            sex_at_birth: row.sex_at_birth,
            reason_for_visit: row.reason_for_visit,
            location_id: row.location_id,
            location_name: row.location_name,
            status: row.status,
            captured_at: row.captured_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPatient {
    pub pending_id: i64,
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub dob: Option<String>,
    pub mobile_phone: Option<String>,
    pub sex_at_birth: Option<String>,
    pub reason_for_visit: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub status: String,
    pub emr_id: Option<String>,
    pub raw_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PendingPatientRecord> for PendingPatient {
    fn from(row: PendingPatientRecord) -> Self {
        Self {
            pending_id: row.pending_id,
            booking_id: row.booking_id,
            booking_number: row.booking_number,
            patient_number: row.patient_number,
            legal_first_name: row.legal_first_name,
            legal_last_name: row.legal_last_name,
            dob: row.dob,
            mobile_phone: row.mobile_phone,
            sex_at_birth: row.sex_at_birth,
            reason_for_visit: row.reason_for_visit,
            location_id: row.location_id,
            location_name: row.location_name,
            status: row.status,
            emr_id: row.emr_id,
            raw_payload: row.raw_payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientList {
    pub patients: Vec<Patient>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPatientList {
    pub pending_patients: Vec<PendingPatient>,
    pub total: usize,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPatientRequest {
    #[serde(default)]
    pub emr_id: String,
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub dob: Option<String>,
    pub mobile_phone: Option<String>,
    pub sex_at_birth: Option<String>,
    pub reason_for_visit: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub status: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientListQuery {
    pub location_id: Option<String>,
    /// Comma separated, case-insensitive.
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPatientRequest {
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
    pub legal_first_name: Option<String>,
    pub legal_last_name: Option<String>,
    pub dob: Option<String>,
    pub mobile_phone: Option<String>,
    pub sex_at_birth: Option<String>,
    pub reason_for_visit: Option<String>,
    pub location_id: Option<String>,
    pub location_name: Option<String>,
    pub raw_payload: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPatientUpdateRequest {
    pub status: Option<String>,
    pub emr_id: Option<String>,
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotePendingRequest {
    #[serde(default)]
    pub emr_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient {0} not found")]
    NotFound(String),

    #[error("Pending patient {0} not found")]
    PendingNotFound(i64),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(_) | PatientError::PendingNotFound(_) => AppError::NotFound(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Database(e) => e.into(),
        }
    }
}

impl From<AppError> for PatientError {
    fn from(err: AppError) -> Self {
        PatientError::ValidationError(match err {
            AppError::ValidationError(msg) | AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        })
    }
}

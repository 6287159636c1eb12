//! Row types returned by the stores and the inputs used to write them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use shared_models::status::{AlertSeverity, AlertSource, PendingStatus, QueueStatus, VmStatus};

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PatientRecord {
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

/// Upsert input keyed by `emr_id`. `None` fields keep the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPatient {
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

#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub location_id: Option<String>,
    /// Upper-cased statuses; empty means any.
    pub statuses: Vec<String>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PendingPatientRecord {
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

impl PendingPatientRecord {
    /// Patient upsert built from the captured intake fields.
    pub fn to_new_patient(&self, emr_id: &str) -> NewPatient {
        NewPatient {
            emr_id: emr_id.to_string(),
            booking_id: self.booking_id.clone(),
            booking_number: self.booking_number.clone(),
            patient_number: self.patient_number.clone(),
            legal_first_name: self.legal_first_name.clone(),
            legal_last_name: self.legal_last_name.clone(),
            dob: self.dob.clone(),
            mobile_phone: self.mobile_phone.clone(),
            sex_at_birth: self.sex_at_birth.clone(),
            reason_for_visit: self.reason_for_visit.clone(),
            location_id: self.location_id.clone(),
            location_name: self.location_name.clone(),
            status: None,
            captured_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPendingPatient {
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

#[derive(Debug, Clone, Default)]
pub struct PendingPatientUpdate {
    pub status: Option<PendingStatus>,
    pub emr_id: Option<String>,
    pub booking_id: Option<String>,
    pub booking_number: Option<String>,
    pub patient_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub status: Option<PendingStatus>,
    pub limit: i64,
}

// ---------------------------------------------------------------------------
// Encounters, queue, summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EncounterRecord {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewEncounter {
    pub encounter_id: String,
    pub emr_id: String,
    pub encounter_payload: Value,
    pub trace_id: Option<String>,
    pub chief_complaints: Option<Value>,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QueueRecord {
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

impl QueueRecord {
    pub fn queue_status(&self) -> Result<QueueStatus, String> {
        self.status.parse()
    }
}

/// Insert input for the queue. An existing entry for the same encounter keeps
/// its status and only has its payload refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueEntry {
    pub encounter_id: String,
    pub emr_id: Option<String>,
    pub raw_payload: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub emr_id: Option<String>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SummaryRecord {
    pub id: i64,
    pub emr_id: String,
    pub encounter_id: Option<String>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSummary {
    pub emr_id: String,
    pub encounter_id: Option<String>,
    pub note: String,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub emr_id: Option<String>,
    pub encounter_id: Option<String>,
    pub limit: i64,
}

// ---------------------------------------------------------------------------
// Health, alerts, process times
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VmHealthRecord {
    pub vm_id: String,
    pub server_id: Option<String>,
    pub status: String,
    pub process_name: Option<String>,
    pub processing_queue_id: Option<Uuid>,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VmHeartbeat {
    pub vm_id: String,
    pub server_id: Option<String>,
    pub status: VmStatus,
    pub process_name: Option<String>,
    pub processing_queue_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServerHealthRecord {
    pub server_id: String,
    pub hostname: Option<String>,
    pub status: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub metadata: Option<Value>,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerHeartbeat {
    pub server_id: String,
    pub hostname: Option<String>,
    pub status: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub metadata: Option<Value>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub alert_id: Uuid,
    pub source: String,
    pub source_id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub details: Option<Value>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub source: AlertSource,
    pub source_id: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub resolved: Option<bool>,
    pub severity: Option<AlertSeverity>,
    pub source: Option<AlertSource>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProcessTimeRecord {
    pub id: i64,
    pub process_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessTime {
    pub process_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl NewProcessTime {
    pub fn duration_seconds(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProcessTimeStats {
    pub count: i64,
    pub average_seconds: Option<f64>,
    pub min_seconds: Option<f64>,
    pub max_seconds: Option<f64>,
}

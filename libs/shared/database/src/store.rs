//! Storage seams used by the cells. `PgStore` is the production backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use shared_models::status::QueueStatus;

use crate::error::DbResult;
use crate::records::*;

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn upsert_patient(&self, patient: &NewPatient) -> DbResult<PatientRecord>;
    async fn get_patient(&self, emr_id: &str) -> DbResult<Option<PatientRecord>>;
    async fn list_patients(&self, filter: &PatientFilter) -> DbResult<Vec<PatientRecord>>;
    async fn update_patient_status(&self, emr_id: &str, status: &str) -> DbResult<Option<PatientRecord>>;

    async fn upsert_pending_patient(&self, pending: &NewPendingPatient) -> DbResult<PendingPatientRecord>;
    async fn get_pending_patient(&self, pending_id: i64) -> DbResult<Option<PendingPatientRecord>>;
    async fn list_pending_patients(&self, filter: &PendingFilter) -> DbResult<Vec<PendingPatientRecord>>;
    async fn update_pending_patient(
        &self,
        pending_id: i64,
        update: &PendingPatientUpdate,
    ) -> DbResult<Option<PendingPatientRecord>>;

    /// Marks the pending row COMPLETED and upserts the patient in one unit.
    async fn promote_pending_patient(&self, pending_id: i64, emr_id: &str) -> DbResult<Option<PatientRecord>>;
}

#[async_trait]
pub trait EncounterStore: Send + Sync {
    async fn upsert_encounter(&self, encounter: &NewEncounter) -> DbResult<EncounterRecord>;
    async fn get_encounter(&self, encounter_id: &str) -> DbResult<Option<EncounterRecord>>;
    async fn list_encounters(&self, emr_id: Option<&str>, limit: i64) -> DbResult<Vec<EncounterRecord>>;
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn upsert_queue_entry(&self, entry: &NewQueueEntry) -> DbResult<QueueRecord>;
    async fn get_queue_entry(&self, queue_id: Uuid) -> DbResult<Option<QueueRecord>>;
    async fn get_queue_entry_by_encounter(&self, encounter_id: &str) -> DbResult<Option<QueueRecord>>;
    async fn list_queue(&self, filter: &QueueFilter) -> DbResult<Vec<QueueRecord>>;

    /// Compare-and-set: only applies when the stored status equals `expected`.
    async fn update_queue_status(
        &self,
        queue_id: Uuid,
        expected: QueueStatus,
        status: QueueStatus,
        error_message: Option<&str>,
    ) -> DbResult<Option<QueueRecord>>;

    /// Moves the oldest PENDING entry to PROCESSING.
    async fn claim_next_queue_entry(&self) -> DbResult<Option<QueueRecord>>;
    async fn set_parsed_payload(&self, queue_id: Uuid, parsed: &Value) -> DbResult<Option<QueueRecord>>;
    async fn set_validation_result(&self, queue_id: Uuid, result: &Value) -> DbResult<Option<QueueRecord>>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn create_summary(&self, summary: &NewSummary) -> DbResult<SummaryRecord>;
    async fn get_summary(&self, id: i64) -> DbResult<Option<SummaryRecord>>;
    async fn list_summaries(&self, filter: &SummaryFilter) -> DbResult<Vec<SummaryRecord>>;
}

#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn upsert_vm_health(&self, heartbeat: &VmHeartbeat) -> DbResult<VmHealthRecord>;
    async fn get_vm_health(&self, vm_id: &str) -> DbResult<Option<VmHealthRecord>>;
    async fn list_vm_health(&self) -> DbResult<Vec<VmHealthRecord>>;
    async fn list_stale_vms(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<VmHealthRecord>>;

    async fn upsert_server_health(&self, heartbeat: &ServerHeartbeat) -> DbResult<ServerHealthRecord>;
    async fn get_server_health(&self, server_id: &str) -> DbResult<Option<ServerHealthRecord>>;
    async fn list_server_health(&self) -> DbResult<Vec<ServerHealthRecord>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Inserts the alert unless an unresolved one exists for the same source
    /// id and type, in which case nothing is written and `None` is returned.
    async fn create_alert(&self, alert: &NewAlert) -> DbResult<Option<AlertRecord>>;
    async fn find_open_alert(&self, source_id: &str, alert_type: &str) -> DbResult<Option<AlertRecord>>;
    async fn list_alerts(&self, filter: &AlertFilter) -> DbResult<Vec<AlertRecord>>;
    async fn resolve_alert(&self, alert_id: Uuid) -> DbResult<Option<AlertRecord>>;
}

#[async_trait]
pub trait ProcessTimeStore: Send + Sync {
    async fn record_process_time(&self, record: &NewProcessTime) -> DbResult<ProcessTimeRecord>;
    async fn list_process_times(&self, process_name: Option<&str>, limit: i64) -> DbResult<Vec<ProcessTimeRecord>>;
    async fn process_time_stats(&self, process_name: Option<&str>) -> DbResult<ProcessTimeStats>;
}

/// Everything the API needs from persistence.
#[async_trait]
pub trait Database:
    PatientStore + EncounterStore + QueueStore + SummaryStore + HealthStore + AlertStore + ProcessTimeStore
{
    async fn ping(&self) -> DbResult<()>;
}

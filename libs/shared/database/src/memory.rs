//! In-process store with the same upsert semantics as `PgStore`. Used by the
//! cell tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_models::status::{PendingStatus, QueueStatus};

use crate::error::DbResult;
use crate::records::*;
use crate::store::*;

#[derive(Default)]
struct Tables {
    next_id: i64,
    patients: Vec<PatientRecord>,
    pending: Vec<PendingPatientRecord>,
    encounters: Vec<EncounterRecord>,
    queue: Vec<QueueRecord>,
    summaries: Vec<SummaryRecord>,
    vms: HashMap<String, VmHealthRecord>,
    servers: HashMap<String, ServerHealthRecord>,
    alerts: Vec<AlertRecord>,
    process_times: Vec<ProcessTimeRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn upsert_patient(&mut self, patient: &NewPatient) -> PatientRecord {
        let now = Utc::now();
        if let Some(existing) = self.patients.iter_mut().find(|p| p.emr_id == patient.emr_id) {
            keep(&mut existing.booking_id, &patient.booking_id);
            keep(&mut existing.booking_number, &patient.booking_number);
            keep(&mut existing.patient_number, &patient.patient_number);
            keep(&mut existing.legal_first_name, &patient.legal_first_name);
            keep(&mut existing.legal_last_name, &patient.legal_last_name);
            keep(&mut existing.dob, &patient.dob);
            keep(&mut existing.mobile_phone, &patient.mobile_phone);
            keep(&mut existing.sex_at_birth, &patient.sex_at_birth);
            keep(&mut existing.reason_for_visit, &patient.reason_for_visit);
            keep(&mut existing.location_id, &patient.location_id);
            keep(&mut existing.location_name, &patient.location_name);
            keep(&mut existing.status, &patient.status);
            if existing.captured_at.is_none() {
                existing.captured_at = patient.captured_at;
            }
            existing.updated_at = now;
            return existing.clone();
        }

        let record = PatientRecord {
            id: self.next_id(),
            emr_id: patient.emr_id.clone(),
            booking_id: patient.booking_id.clone(),
            booking_number: patient.booking_number.clone(),
            patient_number: patient.patient_number.clone(),
            legal_first_name: patient.legal_first_name.clone(),
            legal_last_name: patient.legal_last_name.clone(),
            dob: patient.dob.clone(),
            mobile_phone: patient.mobile_phone.clone(),
            sex_at_birth: patient.sex_at_birth.clone(),
            reason_for_visit: patient.reason_for_visit.clone(),
            location_id: patient.location_id.clone(),
            location_name: patient.location_name.clone(),
            status: patient.status.clone(),
            captured_at: patient.captured_at,
            created_at: now,
            updated_at: now,
        };
        self.patients.push(record.clone());
        record
    }
}

fn keep<T: Clone>(stored: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        *stored = incoming.clone();
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, key: F, limit: i64) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
    rows.truncate(limit.max(0) as usize);
    rows
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a VM heartbeat timestamp, for staleness tests.
    pub async fn backdate_vm(&self, vm_id: &str, at: DateTime<Utc>) {
        let mut tables = self.tables.write().await;
        if let Some(vm) = tables.vms.get_mut(vm_id) {
            vm.last_heartbeat = at;
        }
    }
}

#[async_trait]
impl PatientStore for MemoryStore {
    async fn upsert_patient(&self, patient: &NewPatient) -> DbResult<PatientRecord> {
        Ok(self.tables.write().await.upsert_patient(patient))
    }

    async fn get_patient(&self, emr_id: &str) -> DbResult<Option<PatientRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.patients.iter().find(|p| p.emr_id == emr_id).cloned())
    }

    async fn list_patients(&self, filter: &PatientFilter) -> DbResult<Vec<PatientRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .patients
            .iter()
            .filter(|p| filter.location_id.is_none() || p.location_id == filter.location_id)
            .filter(|p| {
                filter.statuses.is_empty()
                    || p.status
                        .as_ref()
                        .map(|s| filter.statuses.contains(&s.to_ascii_uppercase()))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(newest_first(rows, |p| p.updated_at, filter.limit))
    }

    async fn update_patient_status(&self, emr_id: &str, status: &str) -> DbResult<Option<PatientRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.patients.iter_mut().find(|p| p.emr_id == emr_id).map(|p| {
            p.status = Some(status.to_string());
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn upsert_pending_patient(&self, pending: &NewPendingPatient) -> DbResult<PendingPatientRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if pending.booking_id.is_some() {
            if let Some(existing) = tables.pending.iter_mut().find(|p| p.booking_id == pending.booking_id) {
                keep(&mut existing.booking_number, &pending.booking_number);
                keep(&mut existing.patient_number, &pending.patient_number);
                keep(&mut existing.legal_first_name, &pending.legal_first_name);
                keep(&mut existing.legal_last_name, &pending.legal_last_name);
                keep(&mut existing.dob, &pending.dob);
                keep(&mut existing.mobile_phone, &pending.mobile_phone);
                keep(&mut existing.sex_at_birth, &pending.sex_at_birth);
                keep(&mut existing.reason_for_visit, &pending.reason_for_visit);
                keep(&mut existing.location_id, &pending.location_id);
                keep(&mut existing.location_name, &pending.location_name);
                keep(&mut existing.raw_payload, &pending.raw_payload);
                existing.updated_at = now;
                return Ok(existing.clone());
            }
        }

        let record = PendingPatientRecord {
            pending_id: tables.next_id(),
            booking_id: pending.booking_id.clone(),
            booking_number: pending.booking_number.clone(),
            patient_number: pending.patient_number.clone(),
            legal_first_name: pending.legal_first_name.clone(),
            legal_last_name: pending.legal_last_name.clone(),
            dob: pending.dob.clone(),
            mobile_phone: pending.mobile_phone.clone(),
            sex_at_birth: pending.sex_at_birth.clone(),
            reason_for_visit: pending.reason_for_visit.clone(),
            location_id: pending.location_id.clone(),
            location_name: pending.location_name.clone(),
            status: PendingStatus::Pending.as_str().to_string(),
            emr_id: None,
            raw_payload: pending.raw_payload.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.pending.push(record.clone());
        Ok(record)
    }

    async fn get_pending_patient(&self, pending_id: i64) -> DbResult<Option<PendingPatientRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.pending.iter().find(|p| p.pending_id == pending_id).cloned())
    }

    async fn list_pending_patients(&self, filter: &PendingFilter) -> DbResult<Vec<PendingPatientRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .pending
            .iter()
            .filter(|p| filter.status.map(|s| p.status == s.as_str()).unwrap_or(true))
            .cloned()
            .collect();
        Ok(newest_first(rows, |p| p.created_at, filter.limit))
    }

    async fn update_pending_patient(
        &self,
        pending_id: i64,
        update: &PendingPatientUpdate,
    ) -> DbResult<Option<PendingPatientRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.pending.iter_mut().find(|p| p.pending_id == pending_id).map(|p| {
            if let Some(status) = update.status {
                p.status = status.as_str().to_string();
            }
            keep(&mut p.emr_id, &update.emr_id);
            keep(&mut p.booking_id, &update.booking_id);
            keep(&mut p.booking_number, &update.booking_number);
            keep(&mut p.patient_number, &update.patient_number);
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn promote_pending_patient(&self, pending_id: i64, emr_id: &str) -> DbResult<Option<PatientRecord>> {
        let mut tables = self.tables.write().await;
        let Some(pending) = tables.pending.iter_mut().find(|p| p.pending_id == pending_id) else {
            return Ok(None);
        };
        pending.status = PendingStatus::Completed.as_str().to_string();
        pending.emr_id = Some(emr_id.to_string());
        pending.updated_at = Utc::now();
        let patient = pending.to_new_patient(emr_id);
        Ok(Some(tables.upsert_patient(&patient)))
    }
}

#[async_trait]
impl EncounterStore for MemoryStore {
    async fn upsert_encounter(&self, encounter: &NewEncounter) -> DbResult<EncounterRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables.encounters.iter_mut().find(|e| e.encounter_id == encounter.encounter_id) {
            existing.emr_id = encounter.emr_id.clone();
            existing.encounter_payload = encounter.encounter_payload.clone();
            keep(&mut existing.trace_id, &encounter.trace_id);
            keep(&mut existing.chief_complaints, &encounter.chief_complaints);
            keep(&mut existing.status, &encounter.status);
            keep(&mut existing.created_by, &encounter.created_by);
            keep(&mut existing.started_at, &encounter.started_at);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = EncounterRecord {
            id: Uuid::new_v4(),
            encounter_id: encounter.encounter_id.clone(),
            emr_id: encounter.emr_id.clone(),
            encounter_payload: encounter.encounter_payload.clone(),
            trace_id: encounter.trace_id.clone(),
            chief_complaints: encounter.chief_complaints.clone(),
            status: encounter.status.clone(),
            created_by: encounter.created_by.clone(),
            started_at: encounter.started_at,
            created_at: now,
            updated_at: now,
        };
        tables.encounters.push(record.clone());
        Ok(record)
    }

    async fn get_encounter(&self, encounter_id: &str) -> DbResult<Option<EncounterRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.encounters.iter().find(|e| e.encounter_id == encounter_id).cloned())
    }

    async fn list_encounters(&self, emr_id: Option<&str>, limit: i64) -> DbResult<Vec<EncounterRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .encounters
            .iter()
            .filter(|e| emr_id.map(|id| e.emr_id == id).unwrap_or(true))
            .cloned()
            .collect();
        Ok(newest_first(rows, |e| e.created_at, limit))
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn upsert_queue_entry(&self, entry: &NewQueueEntry) -> DbResult<QueueRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables.queue.iter_mut().find(|q| q.encounter_id == entry.encounter_id) {
            keep(&mut existing.emr_id, &entry.emr_id);
            keep(&mut existing.raw_payload, &entry.raw_payload);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = QueueRecord {
            queue_id: Uuid::new_v4(),
            encounter_id: entry.encounter_id.clone(),
            emr_id: entry.emr_id.clone(),
            status: QueueStatus::Pending.as_str().to_string(),
            raw_payload: entry.raw_payload.clone(),
            parsed_payload: None,
            validation_result: None,
            attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        tables.queue.push(record.clone());
        Ok(record)
    }

    async fn get_queue_entry(&self, queue_id: Uuid) -> DbResult<Option<QueueRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.queue.iter().find(|q| q.queue_id == queue_id).cloned())
    }

    async fn get_queue_entry_by_encounter(&self, encounter_id: &str) -> DbResult<Option<QueueRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.queue.iter().find(|q| q.encounter_id == encounter_id).cloned())
    }

    async fn list_queue(&self, filter: &QueueFilter) -> DbResult<Vec<QueueRecord>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<QueueRecord> = tables
            .queue
            .iter()
            .filter(|q| filter.status.map(|s| q.status == s.as_str()).unwrap_or(true))
            .filter(|q| filter.emr_id.is_none() || q.emr_id == filter.emr_id)
            .cloned()
            .collect();
        rows.sort_by_key(|q| q.created_at);
        rows.truncate(filter.limit.max(0) as usize);
        Ok(rows)
    }

    async fn update_queue_status(
        &self,
        queue_id: Uuid,
        expected: QueueStatus,
        status: QueueStatus,
        error_message: Option<&str>,
    ) -> DbResult<Option<QueueRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .queue
            .iter_mut()
            .find(|q| q.queue_id == queue_id && q.status == expected.as_str())
            .map(|q| {
                if status == QueueStatus::Processing && q.status != QueueStatus::Processing.as_str() {
                    q.attempts += 1;
                }
                q.status = status.as_str().to_string();
                q.error_message = error_message.map(str::to_string);
                q.updated_at = Utc::now();
                q.clone()
            }))
    }

    async fn claim_next_queue_entry(&self) -> DbResult<Option<QueueRecord>> {
        let mut tables = self.tables.write().await;
        let next = tables
            .queue
            .iter_mut()
            .filter(|q| q.status == QueueStatus::Pending.as_str())
            .min_by_key(|q| q.created_at);
        Ok(next.map(|q| {
            q.status = QueueStatus::Processing.as_str().to_string();
            q.attempts += 1;
            q.updated_at = Utc::now();
            q.clone()
        }))
    }

    async fn set_parsed_payload(&self, queue_id: Uuid, parsed: &Value) -> DbResult<Option<QueueRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.queue.iter_mut().find(|q| q.queue_id == queue_id).map(|q| {
            q.parsed_payload = Some(parsed.clone());
            q.updated_at = Utc::now();
            q.clone()
        }))
    }

    async fn set_validation_result(&self, queue_id: Uuid, result: &Value) -> DbResult<Option<QueueRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.queue.iter_mut().find(|q| q.queue_id == queue_id).map(|q| {
            q.validation_result = Some(result.clone());
            q.updated_at = Utc::now();
            q.clone()
        }))
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn create_summary(&self, summary: &NewSummary) -> DbResult<SummaryRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = SummaryRecord {
            id: tables.next_id(),
            emr_id: summary.emr_id.clone(),
            encounter_id: summary.encounter_id.clone(),
            note: summary.note.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.summaries.push(record.clone());
        Ok(record)
    }

    async fn get_summary(&self, id: i64) -> DbResult<Option<SummaryRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.summaries.iter().find(|s| s.id == id).cloned())
    }

    async fn list_summaries(&self, filter: &SummaryFilter) -> DbResult<Vec<SummaryRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .summaries
            .iter()
            .filter(|s| filter.emr_id.as_ref().map(|id| &s.emr_id == id).unwrap_or(true))
            .filter(|s| filter.encounter_id.is_none() || s.encounter_id == filter.encounter_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |s| s.created_at, filter.limit))
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn upsert_vm_health(&self, heartbeat: &VmHeartbeat) -> DbResult<VmHealthRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = tables
            .vms
            .entry(heartbeat.vm_id.clone())
            .and_modify(|vm| {
                keep(&mut vm.server_id, &heartbeat.server_id);
                vm.status = heartbeat.status.as_str().to_string();
                vm.process_name = heartbeat.process_name.clone();
                vm.processing_queue_id = heartbeat.processing_queue_id;
                vm.last_heartbeat = heartbeat.at;
                vm.updated_at = now;
            })
            .or_insert_with(|| VmHealthRecord {
                vm_id: heartbeat.vm_id.clone(),
                server_id: heartbeat.server_id.clone(),
                status: heartbeat.status.as_str().to_string(),
                process_name: heartbeat.process_name.clone(),
                processing_queue_id: heartbeat.processing_queue_id,
                last_heartbeat: heartbeat.at,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn get_vm_health(&self, vm_id: &str) -> DbResult<Option<VmHealthRecord>> {
        Ok(self.tables.read().await.vms.get(vm_id).cloned())
    }

    async fn list_vm_health(&self) -> DbResult<Vec<VmHealthRecord>> {
        let mut rows: Vec<_> = self.tables.read().await.vms.values().cloned().collect();
        rows.sort_by(|a, b| a.vm_id.cmp(&b.vm_id));
        Ok(rows)
    }

    async fn list_stale_vms(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<VmHealthRecord>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .vms
            .values()
            .filter(|vm| vm.last_heartbeat < cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|vm| vm.last_heartbeat);
        Ok(rows)
    }

    async fn upsert_server_health(&self, heartbeat: &ServerHeartbeat) -> DbResult<ServerHealthRecord> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = tables
            .servers
            .entry(heartbeat.server_id.clone())
            .and_modify(|server| {
                keep(&mut server.hostname, &heartbeat.hostname);
                server.status = heartbeat.status.clone();
                server.cpu_usage = heartbeat.cpu_usage;
                server.memory_usage = heartbeat.memory_usage;
                server.disk_usage = heartbeat.disk_usage;
                keep(&mut server.metadata, &heartbeat.metadata);
                server.last_heartbeat = heartbeat.at;
                server.updated_at = now;
            })
            .or_insert_with(|| ServerHealthRecord {
                server_id: heartbeat.server_id.clone(),
                hostname: heartbeat.hostname.clone(),
                status: heartbeat.status.clone(),
                cpu_usage: heartbeat.cpu_usage,
                memory_usage: heartbeat.memory_usage,
                disk_usage: heartbeat.disk_usage,
                metadata: heartbeat.metadata.clone(),
                last_heartbeat: heartbeat.at,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn get_server_health(&self, server_id: &str) -> DbResult<Option<ServerHealthRecord>> {
        Ok(self.tables.read().await.servers.get(server_id).cloned())
    }

    async fn list_server_health(&self) -> DbResult<Vec<ServerHealthRecord>> {
        let mut rows: Vec<_> = self.tables.read().await.servers.values().cloned().collect();
        rows.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        Ok(rows)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create_alert(&self, alert: &NewAlert) -> DbResult<Option<AlertRecord>> {
        let mut tables = self.tables.write().await;
        let open = tables
            .alerts
            .iter()
            .any(|a| !a.resolved && a.source_id == alert.source_id && a.alert_type == alert.alert_type);
        if open {
            return Ok(None);
        }

        let record = AlertRecord {
            alert_id: Uuid::new_v4(),
            source: alert.source.as_str().to_string(),
            source_id: alert.source_id.clone(),
            alert_type: alert.alert_type.clone(),
            severity: alert.severity.as_str().to_string(),
            message: alert.message.clone(),
            details: alert.details.clone(),
            resolved: false,
            resolved_at: None,
            created_at: Utc::now(),
        };
        tables.alerts.push(record.clone());
        Ok(Some(record))
    }

    async fn find_open_alert(&self, source_id: &str, alert_type: &str) -> DbResult<Option<AlertRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alerts
            .iter()
            .filter(|a| !a.resolved && a.source_id == source_id && a.alert_type == alert_type)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> DbResult<Vec<AlertRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .alerts
            .iter()
            .filter(|a| filter.resolved.map(|r| a.resolved == r).unwrap_or(true))
            .filter(|a| filter.severity.map(|s| a.severity == s.as_str()).unwrap_or(true))
            .filter(|a| filter.source.map(|s| a.source == s.as_str()).unwrap_or(true))
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| a.created_at, filter.limit))
    }

    async fn resolve_alert(&self, alert_id: Uuid) -> DbResult<Option<AlertRecord>> {
        let mut tables = self.tables.write().await;
        Ok(tables.alerts.iter_mut().find(|a| a.alert_id == alert_id).map(|a| {
            a.resolved = true;
            if a.resolved_at.is_none() {
                a.resolved_at = Some(Utc::now());
            }
            a.clone()
        }))
    }
}

#[async_trait]
impl ProcessTimeStore for MemoryStore {
    async fn record_process_time(&self, record: &NewProcessTime) -> DbResult<ProcessTimeRecord> {
        let mut tables = self.tables.write().await;
        let row = ProcessTimeRecord {
            id: tables.next_id(),
            process_name: record.process_name.clone(),
            started_at: record.started_at,
            ended_at: record.ended_at,
            duration_seconds: record.duration_seconds(),
            created_at: Utc::now(),
        };
        tables.process_times.push(row.clone());
        Ok(row)
    }

    async fn list_process_times(&self, process_name: Option<&str>, limit: i64) -> DbResult<Vec<ProcessTimeRecord>> {
        let tables = self.tables.read().await;
        let rows = tables
            .process_times
            .iter()
            .filter(|r| process_name.map(|name| r.process_name == name).unwrap_or(true))
            .cloned()
            .collect();
        Ok(newest_first(rows, |r| r.started_at, limit))
    }

    async fn process_time_stats(&self, process_name: Option<&str>) -> DbResult<ProcessTimeStats> {
        let tables = self.tables.read().await;
        let durations: Vec<f64> = tables
            .process_times
            .iter()
            .filter(|r| process_name.map(|name| r.process_name == name).unwrap_or(true))
            .map(|r| r.duration_seconds)
            .collect();

        if durations.is_empty() {
            return Ok(ProcessTimeStats::default());
        }

        let count = durations.len() as i64;
        Ok(ProcessTimeStats {
            count,
            average_seconds: Some(durations.iter().sum::<f64>() / count as f64),
            min_seconds: durations.iter().copied().reduce(f64::min),
            max_seconds: durations.iter().copied().reduce(f64::max),
        })
    }
}

#[async_trait]
impl Database for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use shared_models::status::{AlertSeverity, AlertSource};

    fn patient(emr_id: &str) -> NewPatient {
        NewPatient {
            emr_id: emr_id.to_string(),
            legal_first_name: Some("Ada".to_string()),
            legal_last_name: Some("Lovelace".to_string()),
            mobile_phone: Some("5551234567".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn patient_upsert_keeps_existing_values() {
        let store = MemoryStore::new();
        let first = store.upsert_patient(&patient("EMR-1")).await.unwrap();

        let update = NewPatient {
            emr_id: "EMR-1".to_string(),
            status: Some("CHECKED_IN".to_string()),
            ..Default::default()
        };
        let second = store.upsert_patient(&update).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.legal_first_name.as_deref(), Some("Ada"));
        assert_eq!(second.status.as_deref(), Some("CHECKED_IN"));
        assert_eq!(store.list_patients(&PatientFilter { limit: 10, ..Default::default() }).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_without_booking_id_always_inserts() {
        let store = MemoryStore::new();
        let pending = NewPendingPatient {
            legal_first_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let a = store.upsert_pending_patient(&pending).await.unwrap();
        let b = store.upsert_pending_patient(&pending).await.unwrap();
        assert_ne!(a.pending_id, b.pending_id);

        let keyed = NewPendingPatient {
            booking_id: Some("B-1".to_string()),
            ..pending
        };
        let c = store.upsert_pending_patient(&keyed).await.unwrap();
        let d = store.upsert_pending_patient(&keyed).await.unwrap();
        assert_eq!(c.pending_id, d.pending_id);
    }

    #[tokio::test]
    async fn queue_status_update_is_compare_and_set() {
        let store = MemoryStore::new();
        let entry = store
            .upsert_queue_entry(&NewQueueEntry {
                encounter_id: "ENC-1".to_string(),
                emr_id: None,
                raw_payload: None,
            })
            .await
            .unwrap();

        let stale = store
            .update_queue_status(entry.queue_id, QueueStatus::Processing, QueueStatus::Done, None)
            .await
            .unwrap();
        assert!(stale.is_none());

        let claimed = store.claim_next_queue_entry().await.unwrap().unwrap();
        assert_eq!(claimed.status, "PROCESSING");
        assert_eq!(claimed.attempts, 1);
        assert!(store.claim_next_queue_entry().await.unwrap().is_none());
    }

    fn disk_alert(server_id: &str) -> NewAlert {
        NewAlert {
            source: AlertSource::Server,
            source_id: server_id.to_string(),
            alert_type: "DISK_HIGH".to_string(),
            severity: AlertSeverity::Warning,
            message: "Disk usage high".to_string(),
            details: None,
        }
    }

    #[tokio::test]
    async fn one_open_alert_per_source_and_type() {
        let store = Arc::new(MemoryStore::new());

        let racing = (0..4).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.create_alert(&disk_alert("srv-1")).await.unwrap() })
        });
        let mut created = 0;
        for handle in racing {
            if handle.await.unwrap().is_some() {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        // Another server is independent.
        assert!(store.create_alert(&disk_alert("srv-2")).await.unwrap().is_some());

        // Once resolved, the same alert can be raised again.
        let open = store.find_open_alert("srv-1", "DISK_HIGH").await.unwrap().unwrap();
        store.resolve_alert(open.alert_id).await.unwrap();
        assert!(store.create_alert(&disk_alert("srv-1")).await.unwrap().is_some());
    }
}

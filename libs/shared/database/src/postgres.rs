use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::status::{PendingStatus, QueueStatus};

use crate::error::{DbError, DbResult};
use crate::records::*;
use crate::store::*;

const SCHEMA: &str = include_str!("../schema.sql");

/// Postgres backend. All statements are parameterized.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> DbResult<Self> {
        if config.database_url.is_empty() {
            return Err(DbError::Schema("DATABASE_URL is required".to_string()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        info!("Connected to Postgres (max {} connections)", config.database_max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> DbResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Schema(e.to_string()))?;
        debug!("Database schema verified");
        Ok(())
    }
}

async fn upsert_patient_with<'e, E>(executor: E, patient: &NewPatient) -> DbResult<PatientRecord>
where
    E: Executor<'e, Database = Postgres>,
{
    let record = sqlx::query_as::<_, PatientRecord>(
        r#"
        INSERT INTO patients (
            emr_id, booking_id, booking_number, patient_number,
            legal_first_name, legal_last_name, dob, mobile_phone,
            sex_at_birth, reason_for_visit, location_id, location_name,
            status, captured_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (emr_id) DO UPDATE SET
            booking_id       = COALESCE(EXCLUDED.booking_id, patients.booking_id),
            booking_number   = COALESCE(EXCLUDED.booking_number, patients.booking_number),
            patient_number   = COALESCE(EXCLUDED.patient_number, patients.patient_number),
            legal_first_name = COALESCE(EXCLUDED.legal_first_name, patients.legal_first_name),
            legal_last_name  = COALESCE(EXCLUDED.legal_last_name, patients.legal_last_name),
            dob              = COALESCE(EXCLUDED.dob, patients.dob),
            mobile_phone     = COALESCE(EXCLUDED.mobile_phone, patients.mobile_phone),
            sex_at_birth     = COALESCE(EXCLUDED.sex_at_birth, patients.sex_at_birth),
            reason_for_visit = COALESCE(EXCLUDED.reason_for_visit, patients.reason_for_visit),
            location_id      = COALESCE(EXCLUDED.location_id, patients.location_id),
            location_name    = COALESCE(EXCLUDED.location_name, patients.location_name),
            status           = COALESCE(EXCLUDED.status, patients.status),
            captured_at      = COALESCE(patients.captured_at, EXCLUDED.captured_at),
            updated_at       = now()
        RETURNING *
        "#,
    )
    .bind(&patient.emr_id)
    .bind(&patient.booking_id)
    .bind(&patient.booking_number)
    .bind(&patient.patient_number)
    .bind(&patient.legal_first_name)
    .bind(&patient.legal_last_name)
    .bind(&patient.dob)
    .bind(&patient.mobile_phone)
    .bind(&patient.sex_at_birth)
    .bind(&patient.reason_for_visit)
    .bind(&patient.location_id)
    .bind(&patient.location_name)
    .bind(&patient.status)
    .bind(patient.captured_at)
    .fetch_one(executor)
    .await?;

    Ok(record)
}

#[async_trait]
impl PatientStore for PgStore {
    async fn upsert_patient(&self, patient: &NewPatient) -> DbResult<PatientRecord> {
        upsert_patient_with(&self.pool, patient).await
    }

    async fn get_patient(&self, emr_id: &str) -> DbResult<Option<PatientRecord>> {
        let record = sqlx::query_as::<_, PatientRecord>("SELECT * FROM patients WHERE emr_id = $1")
            .bind(emr_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_patients(&self, filter: &PatientFilter) -> DbResult<Vec<PatientRecord>> {
        let records = sqlx::query_as::<_, PatientRecord>(
            r#"
            SELECT * FROM patients
            WHERE ($1::TEXT IS NULL OR location_id = $1)
              AND (cardinality($2::TEXT[]) = 0 OR UPPER(status) = ANY($2::TEXT[]))
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(&filter.location_id)
        .bind(&filter.statuses)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_patient_status(&self, emr_id: &str, status: &str) -> DbResult<Option<PatientRecord>> {
        let record = sqlx::query_as::<_, PatientRecord>(
            "UPDATE patients SET status = $2, updated_at = now() WHERE emr_id = $1 RETURNING *",
        )
        .bind(emr_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert_pending_patient(&self, pending: &NewPendingPatient) -> DbResult<PendingPatientRecord> {
        let record = sqlx::query_as::<_, PendingPatientRecord>(
            r#"
            INSERT INTO pending_patients (
                booking_id, booking_number, patient_number,
                legal_first_name, legal_last_name, dob, mobile_phone,
                sex_at_birth, reason_for_visit, location_id, location_name,
                raw_payload, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'PENDING')
            ON CONFLICT (booking_id) DO UPDATE SET
                booking_number   = COALESCE(EXCLUDED.booking_number, pending_patients.booking_number),
                patient_number   = COALESCE(EXCLUDED.patient_number, pending_patients.patient_number),
                legal_first_name = COALESCE(EXCLUDED.legal_first_name, pending_patients.legal_first_name),
                legal_last_name  = COALESCE(EXCLUDED.legal_last_name, pending_patients.legal_last_name),
                dob              = COALESCE(EXCLUDED.dob, pending_patients.dob),
                mobile_phone     = COALESCE(EXCLUDED.mobile_phone, pending_patients.mobile_phone),
                sex_at_birth     = COALESCE(EXCLUDED.sex_at_birth, pending_patients.sex_at_birth),
                reason_for_visit = COALESCE(EXCLUDED.reason_for_visit, pending_patients.reason_for_visit),
                location_id      = COALESCE(EXCLUDED.location_id, pending_patients.location_id),
                location_name    = COALESCE(EXCLUDED.location_name, pending_patients.location_name),
                raw_payload      = COALESCE(EXCLUDED.raw_payload, pending_patients.raw_payload),
                updated_at       = now()
            RETURNING *
            "#,
        )
        .bind(&pending.booking_id)
        .bind(&pending.booking_number)
        .bind(&pending.patient_number)
        .bind(&pending.legal_first_name)
        .bind(&pending.legal_last_name)
        .bind(&pending.dob)
        .bind(&pending.mobile_phone)
        .bind(&pending.sex_at_birth)
        .bind(&pending.reason_for_visit)
        .bind(&pending.location_id)
        .bind(&pending.location_name)
        .bind(&pending.raw_payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_pending_patient(&self, pending_id: i64) -> DbResult<Option<PendingPatientRecord>> {
        let record = sqlx::query_as::<_, PendingPatientRecord>(
            "SELECT * FROM pending_patients WHERE pending_id = $1",
        )
        .bind(pending_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_pending_patients(&self, filter: &PendingFilter) -> DbResult<Vec<PendingPatientRecord>> {
        let records = sqlx::query_as::<_, PendingPatientRecord>(
            r#"
            SELECT * FROM pending_patients
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_pending_patient(
        &self,
        pending_id: i64,
        update: &PendingPatientUpdate,
    ) -> DbResult<Option<PendingPatientRecord>> {
        let record = sqlx::query_as::<_, PendingPatientRecord>(
            r#"
            UPDATE pending_patients SET
                status         = COALESCE($2, status),
                emr_id         = COALESCE($3, emr_id),
                booking_id     = COALESCE($4, booking_id),
                booking_number = COALESCE($5, booking_number),
                patient_number = COALESCE($6, patient_number),
                updated_at     = now()
            WHERE pending_id = $1
            RETURNING *
            "#,
        )
        .bind(pending_id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.emr_id)
        .bind(&update.booking_id)
        .bind(&update.booking_number)
        .bind(&update.patient_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn promote_pending_patient(&self, pending_id: i64, emr_id: &str) -> DbResult<Option<PatientRecord>> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query_as::<_, PendingPatientRecord>(
            r#"
            UPDATE pending_patients
            SET status = $3, emr_id = $2, updated_at = now()
            WHERE pending_id = $1
            RETURNING *
            "#,
        )
        .bind(pending_id)
        .bind(emr_id)
        .bind(PendingStatus::Completed.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(pending) = pending else {
            tx.rollback().await?;
            return Ok(None);
        };

        let patient = upsert_patient_with(&mut *tx, &pending.to_new_patient(emr_id)).await?;
        tx.commit().await?;

        debug!("Promoted pending patient {} to EMR {}", pending_id, emr_id);
        Ok(Some(patient))
    }
}

#[async_trait]
impl EncounterStore for PgStore {
    async fn upsert_encounter(&self, encounter: &NewEncounter) -> DbResult<EncounterRecord> {
        let record = sqlx::query_as::<_, EncounterRecord>(
            r#"
            INSERT INTO encounters (
                id, encounter_id, emr_id, encounter_payload, trace_id,
                chief_complaints, status, created_by, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (encounter_id) DO UPDATE SET
                emr_id            = EXCLUDED.emr_id,
                encounter_payload = EXCLUDED.encounter_payload,
                trace_id          = COALESCE(EXCLUDED.trace_id, encounters.trace_id),
                chief_complaints  = COALESCE(EXCLUDED.chief_complaints, encounters.chief_complaints),
                status            = COALESCE(EXCLUDED.status, encounters.status),
                created_by        = COALESCE(EXCLUDED.created_by, encounters.created_by),
                started_at        = COALESCE(EXCLUDED.started_at, encounters.started_at),
                updated_at        = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&encounter.encounter_id)
        .bind(&encounter.emr_id)
        .bind(&encounter.encounter_payload)
        .bind(&encounter.trace_id)
        .bind(&encounter.chief_complaints)
        .bind(&encounter.status)
        .bind(&encounter.created_by)
        .bind(encounter.started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_encounter(&self, encounter_id: &str) -> DbResult<Option<EncounterRecord>> {
        let record = sqlx::query_as::<_, EncounterRecord>("SELECT * FROM encounters WHERE encounter_id = $1")
            .bind(encounter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_encounters(&self, emr_id: Option<&str>, limit: i64) -> DbResult<Vec<EncounterRecord>> {
        let records = sqlx::query_as::<_, EncounterRecord>(
            r#"
            SELECT * FROM encounters
            WHERE ($1::TEXT IS NULL OR emr_id = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(emr_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl QueueStore for PgStore {
    async fn upsert_queue_entry(&self, entry: &NewQueueEntry) -> DbResult<QueueRecord> {
        let record = sqlx::query_as::<_, QueueRecord>(
            r#"
            INSERT INTO queue (queue_id, encounter_id, emr_id, status, raw_payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (encounter_id) DO UPDATE SET
                emr_id      = COALESCE(EXCLUDED.emr_id, queue.emr_id),
                raw_payload = COALESCE(EXCLUDED.raw_payload, queue.raw_payload),
                updated_at  = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.encounter_id)
        .bind(&entry.emr_id)
        .bind(QueueStatus::Pending.as_str())
        .bind(&entry.raw_payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_queue_entry(&self, queue_id: Uuid) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>("SELECT * FROM queue WHERE queue_id = $1")
            .bind(queue_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn get_queue_entry_by_encounter(&self, encounter_id: &str) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>("SELECT * FROM queue WHERE encounter_id = $1")
            .bind(encounter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_queue(&self, filter: &QueueFilter) -> DbResult<Vec<QueueRecord>> {
        let records = sqlx::query_as::<_, QueueRecord>(
            r#"
            SELECT * FROM queue
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR emr_id = $2)
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.emr_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn update_queue_status(
        &self,
        queue_id: Uuid,
        expected: QueueStatus,
        status: QueueStatus,
        error_message: Option<&str>,
    ) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>(
            r#"
            UPDATE queue SET
                status        = $3::TEXT,
                attempts      = attempts + CASE WHEN $3::TEXT = 'PROCESSING' AND status <> 'PROCESSING' THEN 1 ELSE 0 END,
                error_message = $4,
                updated_at    = now()
            WHERE queue_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(queue_id)
        .bind(expected.as_str())
        .bind(status.as_str())
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn claim_next_queue_entry(&self) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>(
            r#"
            UPDATE queue SET
                status     = 'PROCESSING',
                attempts   = attempts + 1,
                updated_at = now()
            WHERE queue_id = (
                SELECT queue_id FROM queue
                WHERE status = 'PENDING'
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn set_parsed_payload(&self, queue_id: Uuid, parsed: &Value) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>(
            "UPDATE queue SET parsed_payload = $2, updated_at = now() WHERE queue_id = $1 RETURNING *",
        )
        .bind(queue_id)
        .bind(parsed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn set_validation_result(&self, queue_id: Uuid, result: &Value) -> DbResult<Option<QueueRecord>> {
        let record = sqlx::query_as::<_, QueueRecord>(
            "UPDATE queue SET validation_result = $2, updated_at = now() WHERE queue_id = $1 RETURNING *",
        )
        .bind(queue_id)
        .bind(result)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl SummaryStore for PgStore {
    async fn create_summary(&self, summary: &NewSummary) -> DbResult<SummaryRecord> {
        let record = sqlx::query_as::<_, SummaryRecord>(
            "INSERT INTO summaries (emr_id, encounter_id, note) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&summary.emr_id)
        .bind(&summary.encounter_id)
        .bind(&summary.note)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_summary(&self, id: i64) -> DbResult<Option<SummaryRecord>> {
        let record = sqlx::query_as::<_, SummaryRecord>("SELECT * FROM summaries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_summaries(&self, filter: &SummaryFilter) -> DbResult<Vec<SummaryRecord>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            r#"
            SELECT * FROM summaries
            WHERE ($1::TEXT IS NULL OR emr_id = $1)
              AND ($2::TEXT IS NULL OR encounter_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(&filter.emr_id)
        .bind(&filter.encounter_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl HealthStore for PgStore {
    async fn upsert_vm_health(&self, heartbeat: &VmHeartbeat) -> DbResult<VmHealthRecord> {
        let record = sqlx::query_as::<_, VmHealthRecord>(
            r#"
            INSERT INTO vm_health (vm_id, server_id, status, process_name, processing_queue_id, last_heartbeat)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (vm_id) DO UPDATE SET
                server_id           = COALESCE(EXCLUDED.server_id, vm_health.server_id),
                status              = EXCLUDED.status,
                process_name        = EXCLUDED.process_name,
                processing_queue_id = EXCLUDED.processing_queue_id,
                last_heartbeat      = EXCLUDED.last_heartbeat,
                updated_at          = now()
            RETURNING *
            "#,
        )
        .bind(&heartbeat.vm_id)
        .bind(&heartbeat.server_id)
        .bind(heartbeat.status.as_str())
        .bind(&heartbeat.process_name)
        .bind(heartbeat.processing_queue_id)
        .bind(heartbeat.at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_vm_health(&self, vm_id: &str) -> DbResult<Option<VmHealthRecord>> {
        let record = sqlx::query_as::<_, VmHealthRecord>("SELECT * FROM vm_health WHERE vm_id = $1")
            .bind(vm_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_vm_health(&self) -> DbResult<Vec<VmHealthRecord>> {
        let records = sqlx::query_as::<_, VmHealthRecord>("SELECT * FROM vm_health ORDER BY vm_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn list_stale_vms(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<VmHealthRecord>> {
        let records = sqlx::query_as::<_, VmHealthRecord>(
            "SELECT * FROM vm_health WHERE last_heartbeat < $1 ORDER BY last_heartbeat ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn upsert_server_health(&self, heartbeat: &ServerHeartbeat) -> DbResult<ServerHealthRecord> {
        let record = sqlx::query_as::<_, ServerHealthRecord>(
            r#"
            INSERT INTO server_health (
                server_id, hostname, status, cpu_usage, memory_usage, disk_usage, metadata, last_heartbeat
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (server_id) DO UPDATE SET
                hostname       = COALESCE(EXCLUDED.hostname, server_health.hostname),
                status         = EXCLUDED.status,
                cpu_usage      = EXCLUDED.cpu_usage,
                memory_usage   = EXCLUDED.memory_usage,
                disk_usage     = EXCLUDED.disk_usage,
                metadata       = COALESCE(EXCLUDED.metadata, server_health.metadata),
                last_heartbeat = EXCLUDED.last_heartbeat,
                updated_at     = now()
            RETURNING *
            "#,
        )
        .bind(&heartbeat.server_id)
        .bind(&heartbeat.hostname)
        .bind(&heartbeat.status)
        .bind(heartbeat.cpu_usage)
        .bind(heartbeat.memory_usage)
        .bind(heartbeat.disk_usage)
        .bind(&heartbeat.metadata)
        .bind(heartbeat.at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_server_health(&self, server_id: &str) -> DbResult<Option<ServerHealthRecord>> {
        let record = sqlx::query_as::<_, ServerHealthRecord>("SELECT * FROM server_health WHERE server_id = $1")
            .bind(server_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_server_health(&self) -> DbResult<Vec<ServerHealthRecord>> {
        let records = sqlx::query_as::<_, ServerHealthRecord>("SELECT * FROM server_health ORDER BY server_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn create_alert(&self, alert: &NewAlert) -> DbResult<Option<AlertRecord>> {
        let record = sqlx::query_as::<_, AlertRecord>(
            r#"
            INSERT INTO alerts (alert_id, source, source_id, alert_type, severity, message, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id, alert_type) WHERE NOT resolved DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(alert.source.as_str())
        .bind(&alert.source_id)
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(&alert.details)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_open_alert(&self, source_id: &str, alert_type: &str) -> DbResult<Option<AlertRecord>> {
        let record = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT * FROM alerts
            WHERE source_id = $1 AND alert_type = $2 AND NOT resolved
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(source_id)
        .bind(alert_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> DbResult<Vec<AlertRecord>> {
        let records = sqlx::query_as::<_, AlertRecord>(
            r#"
            SELECT * FROM alerts
            WHERE ($1::BOOLEAN IS NULL OR resolved = $1)
              AND ($2::TEXT IS NULL OR severity = $2)
              AND ($3::TEXT IS NULL OR source = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter.resolved)
        .bind(filter.severity.map(|s| s.as_str()))
        .bind(filter.source.map(|s| s.as_str()))
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn resolve_alert(&self, alert_id: Uuid) -> DbResult<Option<AlertRecord>> {
        let record = sqlx::query_as::<_, AlertRecord>(
            r#"
            UPDATE alerts SET resolved = TRUE, resolved_at = COALESCE(resolved_at, now())
            WHERE alert_id = $1
            RETURNING *
            "#,
        )
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl ProcessTimeStore for PgStore {
    async fn record_process_time(&self, record: &NewProcessTime) -> DbResult<ProcessTimeRecord> {
        let row = sqlx::query_as::<_, ProcessTimeRecord>(
            r#"
            INSERT INTO experity_process_time (process_name, started_at, ended_at, duration_seconds)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&record.process_name)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.duration_seconds())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_process_times(&self, process_name: Option<&str>, limit: i64) -> DbResult<Vec<ProcessTimeRecord>> {
        let records = sqlx::query_as::<_, ProcessTimeRecord>(
            r#"
            SELECT * FROM experity_process_time
            WHERE ($1::TEXT IS NULL OR process_name = $1)
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(process_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn process_time_stats(&self, process_name: Option<&str>) -> DbResult<ProcessTimeStats> {
        let stats = sqlx::query_as::<_, ProcessTimeStats>(
            r#"
            SELECT
                COUNT(*)::BIGINT      AS count,
                AVG(duration_seconds) AS average_seconds,
                MIN(duration_seconds) AS min_seconds,
                MAX(duration_seconds) AS max_seconds
            FROM experity_process_time
            WHERE ($1::TEXT IS NULL OR process_name = $1)
            "#,
        )
        .bind(process_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[async_trait]
impl Database for PgStore {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Runs the Postgres store against a real server. Set TEST_DATABASE_URL to a
// database the tests may create schemas in; without it every test returns early.

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use uuid::Uuid;

use shared_database::{
    AlertStore, EncounterStore, NewAlert, NewEncounter, NewPatient, NewPendingPatient, NewProcessTime,
    NewQueueEntry, PatientStore, PgStore, ProcessTimeStore, QueueRecord, QueueStore,
};
use shared_models::status::{AlertSeverity, AlertSource, QueueStatus};

struct TestDb {
    store: PgStore,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    /// Connects with `search_path` pinned to a fresh schema so tests never
    /// see each other's rows.
    async fn start() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok().filter(|u| !u.is_empty())?;

        let admin = PgPool::connect(&url).await.expect("TEST_DATABASE_URL is reachable");
        let schema = format!("intake_test_{}", Uuid::new_v4().simple());
        admin
            .execute(format!("CREATE SCHEMA {}", schema).as_str())
            .await
            .expect("create test schema");

        let search_path = schema.clone();
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let statement = format!("SET search_path TO {}", search_path);
                Box::pin(async move {
                    conn.execute(statement.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("connect test pool");

        let store = PgStore::from_pool(pool);
        store.ensure_schema().await.expect("apply schema");
        Some(Self { store, admin, schema })
    }

    async fn finish(self) {
        self.admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await
            .expect("drop test schema");
    }
}

/// Queue rows reference their encounter, so one is stored first.
async fn enqueue(store: &PgStore, encounter_id: &str) -> QueueRecord {
    store
        .upsert_encounter(&NewEncounter {
            encounter_id: encounter_id.to_string(),
            emr_id: "EMR-1".to_string(),
            encounter_payload: json!({ "encounterId": encounter_id }),
            trace_id: None,
            chief_complaints: None,
            status: None,
            created_by: None,
            started_at: None,
        })
        .await
        .unwrap();

    store
        .upsert_queue_entry(&NewQueueEntry {
            encounter_id: encounter_id.to_string(),
            emr_id: Some("EMR-1".to_string()),
            raw_payload: None,
        })
        .await
        .unwrap()
}

fn stale_vm_alert(vm_id: &str) -> NewAlert {
    NewAlert {
        source: AlertSource::Vm,
        source_id: vm_id.to_string(),
        alert_type: "VM_STALE".to_string(),
        severity: AlertSeverity::Critical,
        message: format!("VM {} is silent", vm_id),
        details: None,
    }
}

#[tokio::test]
async fn test_schema_can_be_applied_twice() {
    let Some(db) = TestDb::start().await else {
        return;
    };

    db.store.ensure_schema().await.unwrap();

    db.finish().await;
}

#[tokio::test]
async fn test_patient_upsert_only_overwrites_supplied_fields() {
    let Some(db) = TestDb::start().await else {
        return;
    };
    let captured = Utc::now() - Duration::minutes(5);

    let first = db
        .store
        .upsert_patient(&NewPatient {
            emr_id: "EMR-1".to_string(),
            legal_first_name: Some("Ada".to_string()),
            mobile_phone: Some("5551234567".to_string()),
            captured_at: Some(captured),
            ..Default::default()
        })
        .await
        .unwrap();

    let second = db
        .store
        .upsert_patient(&NewPatient {
            emr_id: "EMR-1".to_string(),
            status: Some("ROOMED".to_string()),
            captured_at: Some(Utc::now()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.legal_first_name.as_deref(), Some("Ada"));
    assert_eq!(second.mobile_phone.as_deref(), Some("5551234567"));
    assert_eq!(second.status.as_deref(), Some("ROOMED"));
    // The first capture time is kept.
    assert_eq!(
        second.captured_at.map(|t| t.timestamp_micros()),
        Some(captured.timestamp_micros())
    );

    db.finish().await;
}

#[tokio::test]
async fn test_promote_is_all_or_nothing() {
    let Some(db) = TestDb::start().await else {
        return;
    };

    assert!(db.store.promote_pending_patient(404, "EMR-X").await.unwrap().is_none());
    assert!(db.store.get_patient("EMR-X").await.unwrap().is_none());

    let pending = NewPendingPatient {
        booking_id: Some("BK-1".to_string()),
        legal_first_name: Some("Grace".to_string()),
        legal_last_name: Some("Hopper".to_string()),
        ..Default::default()
    };
    let row = db.store.upsert_pending_patient(&pending).await.unwrap();
    let again = db.store.upsert_pending_patient(&pending).await.unwrap();
    assert_eq!(row.pending_id, again.pending_id);

    let patient = db
        .store
        .promote_pending_patient(row.pending_id, "EMR-7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(patient.emr_id, "EMR-7");
    assert_eq!(patient.legal_last_name.as_deref(), Some("Hopper"));
    assert_eq!(patient.booking_id.as_deref(), Some("BK-1"));

    let promoted = db.store.get_pending_patient(row.pending_id).await.unwrap().unwrap();
    assert_eq!(promoted.status, "COMPLETED");
    assert_eq!(promoted.emr_id.as_deref(), Some("EMR-7"));

    db.finish().await;
}

#[tokio::test]
async fn test_queue_status_is_compare_and_set() {
    let Some(db) = TestDb::start().await else {
        return;
    };
    let entry = enqueue(&db.store, "ENC-1").await;
    assert_eq!(entry.status, "PENDING");

    let stale = db
        .store
        .update_queue_status(entry.queue_id, QueueStatus::Processing, QueueStatus::Done, None)
        .await
        .unwrap();
    assert!(stale.is_none());

    let failed = db
        .store
        .update_queue_status(entry.queue_id, QueueStatus::Pending, QueueStatus::Error, Some("parse failed"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.status, "ERROR");
    assert_eq!(failed.error_message.as_deref(), Some("parse failed"));

    let retried = db
        .store
        .update_queue_status(entry.queue_id, QueueStatus::Error, QueueStatus::Pending, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retried.status, "PENDING");
    assert_eq!(retried.error_message, None);

    db.finish().await;
}

#[tokio::test]
async fn test_concurrent_claims_take_distinct_entries() {
    let Some(db) = TestDb::start().await else {
        return;
    };
    enqueue(&db.store, "ENC-1").await;

    let (a, b, c) = tokio::join!(
        db.store.claim_next_queue_entry(),
        db.store.claim_next_queue_entry(),
        db.store.claim_next_queue_entry()
    );
    let claimed: Vec<_> = [a.unwrap(), b.unwrap(), c.unwrap()].into_iter().flatten().collect();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, "PROCESSING");
    assert_eq!(claimed[0].attempts, 1);

    assert!(db.store.claim_next_queue_entry().await.unwrap().is_none());

    db.finish().await;
}

#[tokio::test]
async fn test_only_one_open_alert_per_source_and_type() {
    let Some(db) = TestDb::start().await else {
        return;
    };
    let alert = stale_vm_alert("vm-1");

    let (a, b, c) = tokio::join!(
        db.store.create_alert(&alert),
        db.store.create_alert(&alert),
        db.store.create_alert(&alert)
    );
    let created: Vec<_> = [a.unwrap(), b.unwrap(), c.unwrap()].into_iter().flatten().collect();
    assert_eq!(created.len(), 1);

    assert!(db.store.create_alert(&stale_vm_alert("vm-2")).await.unwrap().is_some());

    db.store.resolve_alert(created[0].alert_id).await.unwrap().unwrap();
    let reopened = db.store.create_alert(&alert).await.unwrap().unwrap();
    assert_ne!(reopened.alert_id, created[0].alert_id);

    db.finish().await;
}

#[tokio::test]
async fn test_process_time_stats() {
    let Some(db) = TestDb::start().await else {
        return;
    };
    let start = Utc::now() - Duration::minutes(10);

    for seconds in [30, 90] {
        db.store
            .record_process_time(&NewProcessTime {
                process_name: "patient-lookup".to_string(),
                started_at: start,
                ended_at: start + Duration::seconds(seconds),
            })
            .await
            .unwrap();
    }

    let stats = db.store.process_time_stats(Some("patient-lookup")).await.unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.average_seconds, Some(60.0));
    assert_eq!(stats.min_seconds, Some(30.0));
    assert_eq!(stats.max_seconds, Some(90.0));

    let empty = db.store.process_time_stats(Some("other")).await.unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.average_seconds, None);

    db.finish().await;
}

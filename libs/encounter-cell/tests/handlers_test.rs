use std::sync::Arc;

use axum::{http::StatusCode, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use encounter_cell::create_encounter_router;
use shared_database::{MemoryStore, QueueStore};
use shared_utils::test_utils::{response_json, AuthTestUtils, TestConfig};

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = TestConfig::default().app_state(store.clone());
    (create_encounter_router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(AuthTestUtils::api_key_request(method, uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

fn encounter(encounter_id: &str, complaint: &str) -> Value {
    json!({
        "encounterId": encounter_id,
        "emrId": "EMR-1",
        "encounterPayload": { "chiefComplaint": complaint },
        "traceId": "trace-1"
    })
}

#[tokio::test]
async fn test_create_then_read_encounter() {
    let (app, _) = app();

    let (status, created) = send(&app, "POST", "/", Some(encounter("ENC-1", "cough"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["encounterId"], "ENC-1");
    assert_eq!(created["encounterPayload"]["chiefComplaint"], "cough");

    let (status, fetched) = send(&app, "GET", "/ENC-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (_, list) = send(&app, "GET", "/?emrId=EMR-1", None).await;
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_encounter_creates_queue_entry_once() {
    let (app, store) = app();

    send(&app, "POST", "/", Some(encounter("ENC-2", "fever"))).await;
    let first = store.get_queue_entry_by_encounter("ENC-2").await.unwrap().unwrap();
    assert_eq!(first.status, "PENDING");

    send(&app, "POST", "/", Some(encounter("ENC-2", "fever and chills"))).await;
    let second = store.get_queue_entry_by_encounter("ENC-2").await.unwrap().unwrap();

    assert_eq!(first.queue_id, second.queue_id);
    assert_eq!(second.raw_payload.unwrap()["chiefComplaint"], "fever and chills");
}

#[tokio::test]
async fn test_invalid_encounter_requests() {
    let (app, _) = app();

    let (status, _) = send(&app, "POST", "/", Some(json!({ "encounterId": "E", "emrId": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/", Some(json!({ "encounterId": "E", "emrId": "M" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "encounterPayload is required");

    let (status, _) = send(&app, "GET", "/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

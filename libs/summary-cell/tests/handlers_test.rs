use std::sync::Arc;

use axum::{http::StatusCode, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use shared_database::MemoryStore;
use shared_utils::test_utils::{response_json, AuthTestUtils, TestConfig};
use summary_cell::create_summary_router;

fn app() -> Router {
    let state = TestConfig::default().app_state(Arc::new(MemoryStore::new()));
    create_summary_router(state)
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

#[tokio::test]
async fn test_create_then_read_summary() {
    let app = app();

    let (status, created) = send(
        &app,
        "POST",
        "/",
        Some(json!({ "emrId": "EMR-1", "encounterId": "ENC-1", "note": "Seen for cough." })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_list_summaries_by_emr_and_encounter() {
    let app = app();
    send(&app, "POST", "/", Some(json!({ "emrId": "EMR-1", "encounterId": "ENC-1", "note": "a" }))).await;
    send(&app, "POST", "/", Some(json!({ "emrId": "EMR-1", "encounterId": "ENC-2", "note": "b" }))).await;
    send(&app, "POST", "/", Some(json!({ "emrId": "EMR-2", "note": "c" }))).await;

    let (_, by_emr) = send(&app, "GET", "/?emrId=EMR-1", None).await;
    assert_eq!(by_emr["total"], 2);

    let (_, by_encounter) = send(&app, "GET", "/?emrId=EMR-1&encounterId=ENC-2", None).await;
    assert_eq!(by_encounter["total"], 1);
    assert_eq!(by_encounter["summaries"][0]["note"], "b");
}

#[tokio::test]
async fn test_invalid_summary_requests() {
    let app = app();

    let (status, _) = send(&app, "POST", "/", Some(json!({ "emrId": "EMR-1", "note": " " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/", Some(json!({ "note": "text" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

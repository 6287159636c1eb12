use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use patient_cell::create_patient_router;
use shared_database::MemoryStore;
use shared_utils::test_utils::{response_json, AuthTestUtils, TestConfig};

fn app() -> (Router, Arc<shared_config::AppConfig>) {
    let test_config = TestConfig::default();
    let state = test_config.app_state(Arc::new(MemoryStore::new()));
    (create_patient_router(state.clone()), state.config)
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
async fn test_create_then_read_patient() {
    let (app, _) = app();

    let (status, created) = send(
        &app,
        "POST",
        "/",
        Some(json!({
            "emrId": "EMR-100",
            "legalFirstName": "Ada",
            "legalLastName": "Lovelace",
            "mobilePhone": "5551234567",
            "locationId": "LOC-1",
            "status": "checked_in"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["emrId"], "EMR-100");
    assert_eq!(created["status"], "CHECKED_IN");

    let (status, fetched) = send(&app, "GET", "/EMR-100", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_upsert_is_idempotent_and_keeps_fields() {
    let (app, _) = app();

    send(&app, "POST", "/", Some(json!({ "emrId": "EMR-1", "legalFirstName": "Ada" }))).await;
    let (_, second) = send(&app, "POST", "/", Some(json!({ "emrId": "EMR-1", "dob": "1990-01-01" }))).await;

    assert_eq!(second["legalFirstName"], "Ada");
    assert_eq!(second["dob"], "1990-01-01");

    let (_, list) = send(&app, "GET", "/", None).await;
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_blank_emr_id_is_rejected() {
    let (app, _) = app();

    let (status, body) = send(&app, "POST", "/", Some(json!({ "emrId": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "emrId is required");
}

#[tokio::test]
async fn test_list_filters_by_location_and_status() {
    let (app, _) = app();
    send(&app, "POST", "/", Some(json!({ "emrId": "A", "locationId": "L1", "status": "WAITING" }))).await;
    send(&app, "POST", "/", Some(json!({ "emrId": "B", "locationId": "L1", "status": "ROOMED" }))).await;
    send(&app, "POST", "/", Some(json!({ "emrId": "C", "locationId": "L2", "status": "WAITING" }))).await;

    let (status, body) = send(&app, "GET", "/?locationId=L1&status=waiting,roomed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = send(&app, "GET", "/?status=Waiting", None).await;
    assert_eq!(body["total"], 2);

    let (status, _) = send(&app, "GET", "/?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_update_and_missing_patient() {
    let (app, _) = app();
    send(&app, "POST", "/", Some(json!({ "emrId": "EMR-5" }))).await;

    let (status, body) = send(&app, "PATCH", "/EMR-5/status", Some(json!({ "status": "discharged" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DISCHARGED");

    let (status, _) = send(&app, "PATCH", "/EMR-5/status", Some(json!({ "status": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "PATCH", "/NOPE/status", Some(json!({ "status": "X" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_emr_id_colliding_with_pending_routes_is_rejected() {
    let (app, _) = app();

    let (status, body) = send(&app, "POST", "/", Some(json!({ "emrId": "Pending" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "emrId 'Pending' is reserved");

    let (_, pending) = send(&app, "POST", "/pending", Some(json!({ "legalLastName": "Hopper" }))).await;
    let pending_id = pending["pendingId"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/pending/{}/promote", pending_id),
        Some(json!({ "emrId": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = send(&app, "GET", "/", None).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_pending_capture_update_and_promote() {
    let (app, _) = app();

    let (status, pending) = send(
        &app,
        "POST",
        "/pending",
        Some(json!({
            "bookingId": "BK-1",
            "legalFirstName": "Grace",
            "legalLastName": "Hopper",
            "mobilePhone": "5550001111",
            "rawPayload": { "source": "form" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending["status"], "PENDING");
    let pending_id = pending["pendingId"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/pending/{}", pending_id),
        Some(json!({ "bookingNumber": "0042" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["bookingNumber"], "0042");

    let (status, patient) = send(
        &app,
        "POST",
        &format!("/pending/{}/promote", pending_id),
        Some(json!({ "emrId": "EMR-77" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patient["emrId"], "EMR-77");
    assert_eq!(patient["legalFirstName"], "Grace");
    assert_eq!(patient["bookingNumber"], "0042");

    let (_, list) = send(&app, "GET", "/pending?status=completed", None).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["pendingPatients"][0]["emrId"], "EMR-77");
}

#[tokio::test]
async fn test_pending_validation_and_missing() {
    let (app, _) = app();

    let (status, _) = send(&app, "POST", "/pending", Some(json!({ "bookingId": "BK-2" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/pending/999/promote", Some(json!({ "emrId": "E" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PATCH", "/pending/999", Some(json!({ "status": "FAILED" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/pending?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unauthenticated_request_is_rejected() {
    let (app, config) = app();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let signed = AuthTestUtils::signed_request(&config, "POST", "/", Some(json!({ "emrId": "S-1" })));
    let response = app.oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

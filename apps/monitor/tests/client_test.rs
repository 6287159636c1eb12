use assert_matches::assert_matches;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use intake_monitor::client::{ApiClient, ClientError, IntakeApi, PatientPayload};
use shared_models::status::PendingStatus;
use shared_utils::signing::{verify_signature, SignedParts, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const SECRET: &str = "monitor-hmac-secret";

/// Matches requests whose HMAC signature verifies against `SECRET`.
struct ValidSignature;

impl Match for ValidSignature {
    fn matches(&self, request: &Request) -> bool {
        let header_text = |name: &str| request.headers.get(name).and_then(|v| v.to_str().ok());
        let path_with_query = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };

        verify_signature(
            SECRET,
            SignedParts {
                method: request.method.as_str(),
                path_with_query: &path_with_query,
                timestamp: header_text(TIMESTAMP_HEADER),
                signature: header_text(SIGNATURE_HEADER),
                body: &request.body,
            },
            Utc::now().timestamp(),
            300,
        )
        .is_ok()
    }
}

async fn mount_token(server: &MockServer, token: &str, expires_in: i64, times: Option<u64>) {
    let mock = Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(ValidSignature)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": token,
            "tokenType": "Bearer",
            "expiresIn": expires_in
        })));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), SECRET).unwrap()
}

#[tokio::test]
async fn test_token_is_cached_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(ValidSignature)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "tok-1",
            "tokenType": "Bearer",
            "expiresIn": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/patients/pending"))
        .and(header("authorization", "Bearer tok-1"))
        .and(ValidSignature)
        .and(body_json(json!({ "legalLastName": "Hopper", "locationId": "LOC-1" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "pendingId": 42, "status": "PENDING" })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = PatientPayload {
        legal_last_name: Some("Hopper".to_string()),
        location_id: Some("LOC-1".to_string()),
        ..Default::default()
    };

    assert_eq!(client.create_pending(&payload).await.unwrap(), 42);
    assert_eq!(client.create_pending(&payload).await.unwrap(), 42);
}

#[tokio::test]
async fn test_tokens_near_expiry_are_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "short",
            "tokenType": "Bearer",
            "expiresIn": 30
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/patients/E-1/status"))
        .and(body_json(json!({ "status": "ROOMED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "emrId": "E-1" })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.update_patient_status("E-1", "ROOMED").await.unwrap();
    client.update_patient_status("E-1", "ROOMED").await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_and_retries_once() {
    let server = MockServer::start().await;
    mount_token(&server, "stale", 3600, Some(1)).await;
    mount_token(&server, "fresh", 3600, None).await;

    Mock::given(method("POST"))
        .and(path("/patients/pending/7/promote"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/patients/pending/7/promote"))
        .and(header("authorization", "Bearer fresh"))
        .and(ValidSignature)
        .and(body_json(json!({ "emrId": "E-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "emrId": "E-7" })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server).promote_pending(7, "E-7").await.unwrap();
}

#[tokio::test]
async fn test_second_unauthorized_is_returned() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600, None).await;
    Mock::given(method("POST"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "nope" })))
        .expect(2)
        .mount(&server)
        .await;

    let payload = PatientPayload {
        emr_id: Some("E-1".to_string()),
        ..Default::default()
    };
    let err = client_for(&server).upsert_patient(&payload).await.unwrap_err();
    assert_matches!(err, ClientError::Status { status: 401, .. });
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let server = MockServer::start().await;
    mount_token(&server, "tok", 3600, None).await;
    Mock::given(method("PATCH"))
        .and(path("/patients/pending/9"))
        .and(body_json(json!({ "status": "FAILED" })))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Pending patient 9 not found" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .update_pending_status(9, PendingStatus::Failed)
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::Status { status: 404, ref body } if body.contains("Pending patient 9"));
}

#[tokio::test]
async fn test_token_endpoint_failure_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid request signature" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .update_patient_status("E-1", "DONE")
        .await
        .unwrap_err();
    assert_matches!(err, ClientError::Status { status: 401, .. });
}

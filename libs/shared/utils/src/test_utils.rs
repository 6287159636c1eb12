use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{header, Request};
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use shared_config::AppConfig;
use shared_database::Database;
use shared_models::auth::Caller;

use crate::jwt::issue_token;
use crate::session::{encode_session, SESSION_COOKIE};
use crate::signing::{sign_request, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::state::AppState;

pub const TEST_API_KEY: &str = "test-api-key";

pub struct TestConfig {
    pub hmac_secret: String,
    pub token_secret: String,
    pub session_secret: String,
    pub dashboard_username: String,
    pub dashboard_password_hash: String,
    pub blob_container_url: String,
    pub ai_endpoint: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            hmac_secret: "test-hmac-secret-for-request-signing".to_string(),
            token_secret: "test-token-secret-for-bearer-tokens".to_string(),
            session_secret: "test-session-secret-for-cookies".to_string(),
            dashboard_username: "frontdesk".to_string(),
            dashboard_password_hash: String::new(),
            blob_container_url: "http://localhost:10000/devstoreaccount1/intake".to_string(),
            ai_endpoint: "http://localhost:9999/api/projects/intake".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/intake_test".to_string(),
            database_max_connections: 1,
            bind_addr: "127.0.0.1:0".to_string(),
            hmac_secret: self.hmac_secret.clone(),
            hmac_client_id: "monitor".to_string(),
            signature_tolerance_seconds: 300,
            api_keys: vec![TEST_API_KEY.to_string()],
            token_secret: self.token_secret.clone(),
            token_ttl_seconds: 3600,
            session_secret: self.session_secret.clone(),
            session_ttl_hours: 12,
            dashboard_username: self.dashboard_username.clone(),
            dashboard_password_hash: self.dashboard_password_hash.clone(),
            azure_blob_container_url: self.blob_container_url.clone(),
            azure_blob_sas_token: "sv=2024&sig=test".to_string(),
            azure_ai_endpoint: self.ai_endpoint.clone(),
            azure_ai_api_key: "test-ai-key".to_string(),
            azure_ai_api_version: "2025-05-01".to_string(),
            azure_ai_mapping_agent_id: "asst_mapping".to_string(),
            azure_ai_validation_agent_id: "asst_validation".to_string(),
            azure_ai_timeout_seconds: 5,
            slack_webhook_url: None,
            email_api_url: None,
            email_api_key: None,
            email_from: None,
            email_to: None,
            alert_cpu_threshold: 90.0,
            alert_memory_threshold: 90.0,
            alert_disk_threshold: 90.0,
            alert_critical_threshold: 97.0,
            vm_stale_minutes: 5,
            health_sweep_interval_seconds: 60,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn app_state(&self, db: Arc<dyn Database>) -> AppState {
        AppState::new(self.to_arc(), db)
    }
}

pub struct AuthTestUtils;

impl AuthTestUtils {
    pub fn bearer_token(config: &AppConfig, caller: &Caller) -> String {
        issue_token(caller, &config.token_secret, 3600)
            .map(|(token, _)| token)
            .expect("token secret is set in tests")
    }

    pub fn session_cookie(config: &AppConfig, username: &str) -> String {
        let value = encode_session(username, &config.session_secret, 1)
            .expect("session secret is set in tests");
        format!("{}={}", SESSION_COOKIE, value)
    }

    /// Builds a request signed with the configured HMAC secret.
    pub fn signed_request(config: &AppConfig, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let bytes = body.map(|b| b.to_string().into_bytes()).unwrap_or_default();
        let timestamp = Utc::now().timestamp();
        let signature = sign_request(&config.hmac_secret, method, uri, timestamp, &bytes)
            .expect("hmac secret is set in tests");

        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(bytes))
            .expect("valid test request")
    }

    /// Request authenticated with the test API key.
    pub fn api_key_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", TEST_API_KEY);
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("valid test request"),
            None => builder.body(Body::empty()).expect("valid test request"),
        }
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response body")
}

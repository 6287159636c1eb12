//! Signed HTTP client for the intake API.
//!
//! Every request carries an HMAC signature. A bearer token is obtained from
//! `POST /auth/token` and reused until shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use shared_models::auth::TokenResponse;
use shared_models::status::PendingStatus;
use shared_utils::signing::{sign_request, SignatureError, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Tokens are refreshed this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Request signing failed: {0}")]
    Signing(#[from] SignatureError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),
}

/// Patient fields sent to the API. The same shape serves pending captures
/// and confirmed patients; the server ignores what it does not need.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emr_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex_at_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_visit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
}

/// Operations the monitor performs against the intake API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntakeApi: Send + Sync {
    /// Stores a captured submission and returns its pending id.
    async fn create_pending(&self, payload: &PatientPayload) -> Result<i64, ClientError>;

    async fn promote_pending(&self, pending_id: i64, emr_id: &str) -> Result<(), ClientError>;

    async fn upsert_patient(&self, payload: &PatientPayload) -> Result<(), ClientError>;

    async fn update_patient_status(&self, emr_id: &str, status: &str) -> Result<(), ClientError>;

    async fn update_pending_status(&self, pending_id: i64, status: PendingStatus) -> Result<(), ClientError>;
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct ApiClient {
    http: Client,
    base_url: Url,
    hmac_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl ApiClient {
    pub fn new(base_url: &str, hmac_secret: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            base_url,
            hmac_secret: hmac_secret.into(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_signed(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let bytes = match body {
            Some(value) => serde_json::to_vec(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))?,
            None => Vec::new(),
        };

        let path_with_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        let timestamp = Utc::now().timestamp();
        let signature = sign_request(&self.hmac_secret, method.as_str(), &path_with_query, timestamp, &bytes)?;

        let mut request = self
            .http
            .request(method, url)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if body.is_some() {
            request = request.header(reqwest::header::CONTENT_TYPE, "application/json").body(bytes);
        }

        Ok(request.send().await?)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn bearer_token(&self) -> Result<String, ClientError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let url = self.url(&["auth", "token"])?;
        let response = self.send_signed(Method::POST, url, None, None).await?;
        let body = Self::read_json(response).await?;
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| ClientError::InvalidResponse(format!("token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.max(0) as u64);
        debug!("Obtained API token valid for {}s", lifetime.as_secs());
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Sends an authenticated request, retrying once with a fresh token when
    /// the API answers 401.
    async fn call(&self, method: Method, segments: &[&str], body: Option<Value>) -> Result<Value, ClientError> {
        let url = self.url(segments)?;

        let token = self.bearer_token().await?;
        let response = self
            .send_signed(method.clone(), url.clone(), body.as_ref(), Some(&token))
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::read_json(response).await;
        }

        warn!("API rejected cached token for {} {}; refreshing", method, url.path());
        self.invalidate_token().await;
        let token = self.bearer_token().await?;
        let response = self.send_signed(method, url, body.as_ref(), Some(&token)).await?;
        Self::read_json(response).await
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl IntakeApi for ApiClient {
    async fn create_pending(&self, payload: &PatientPayload) -> Result<i64, ClientError> {
        let body = self
            .call(Method::POST, &["patients", "pending"], Some(to_body(payload)?))
            .await?;
        body.get("pendingId")
            .and_then(Value::as_i64)
            .ok_or_else(|| ClientError::InvalidResponse("pending response has no pendingId".to_string()))
    }

    async fn promote_pending(&self, pending_id: i64, emr_id: &str) -> Result<(), ClientError> {
        let id = pending_id.to_string();
        self.call(
            Method::POST,
            &["patients", "pending", &id, "promote"],
            Some(json!({ "emrId": emr_id })),
        )
        .await?;
        Ok(())
    }

    async fn upsert_patient(&self, payload: &PatientPayload) -> Result<(), ClientError> {
        self.call(Method::POST, &["patients"], Some(to_body(payload)?)).await?;
        Ok(())
    }

    async fn update_patient_status(&self, emr_id: &str, status: &str) -> Result<(), ClientError> {
        self.call(
            Method::PATCH,
            &["patients", emr_id, "status"],
            Some(json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    async fn update_pending_status(&self, pending_id: i64, status: PendingStatus) -> Result<(), ClientError> {
        let id = pending_id.to_string();
        self.call(
            Method::PATCH,
            &["patients", "pending", &id],
            Some(json!({ "status": status.to_string() })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_encoded_paths() {
        let client = ApiClient::new("http://localhost:8000", "secret").unwrap();
        let url = client.url(&["patients", "E 1/2", "status"]).unwrap();
        assert_eq!(url.path(), "/patients/E%201%2F2/status");

        let prefixed = ApiClient::new("http://localhost:8000/api/", "secret").unwrap();
        assert_eq!(prefixed.url(&["auth", "token"]).unwrap().path(), "/api/auth/token");
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(ApiClient::new("not a url", "s"), Err(ClientError::InvalidUrl(_))));
        assert!(matches!(ApiClient::new("mailto:ops@example.com", "s"), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn payload_skips_missing_fields() {
        let payload = PatientPayload {
            emr_id: Some("E-1".to_string()),
            legal_last_name: Some("Hopper".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "emrId": "E-1", "legalLastName": "Hopper" })
        );
    }
}

use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::{OriginalUri, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::Caller;
use shared_models::error::AppError;

use crate::jwt::validate_token;
use crate::session::{decode_session, SESSION_COOKIE};
use crate::signing::{verify_signature, SignedParts, SIGNATURE_HEADER, TIMESTAMP_HEADER};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Largest body buffered for signature checks. Image uploads are the biggest
/// signed payloads.
pub const MAX_SIGNED_BODY_BYTES: usize = 16 * 1024 * 1024;

// Bearer, then API key, then request signature, then session cookie. The first
// scheme present decides the outcome.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (caller, mut request) = authenticate(&config, request).await?;
    debug!("Authenticated {:?} caller {}", caller.kind, caller.id);

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

async fn authenticate(config: &AppConfig, request: Request<Body>) -> Result<(Caller, Request<Body>), AppError> {
    let headers = request.headers();

    if let Some(auth_header) = headers.get(http::header::AUTHORIZATION) {
        let auth_value = auth_header
            .to_str()
            .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;
        let token = auth_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

        let caller = validate_token(token.trim(), &config.token_secret).map_err(AppError::Auth)?;
        return Ok((caller, request));
    }

    if let Some(key) = headers.get(API_KEY_HEADER) {
        let key = key
            .to_str()
            .map_err(|_| AppError::Auth("Invalid API key".to_string()))?;
        let caller = api_key_caller(config, key.trim())?;
        return Ok((caller, request));
    }

    if headers.contains_key(SIGNATURE_HEADER) || headers.contains_key(TIMESTAMP_HEADER) {
        return verify_signed_request(config, request).await;
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let claims = decode_session(cookie.value(), &config.session_secret).map_err(AppError::Auth)?;
        return Ok((Caller::dashboard(claims.username), request));
    }

    Err(AppError::Auth("Missing credentials".to_string()))
}

fn api_key_caller(config: &AppConfig, key: &str) -> Result<Caller, AppError> {
    let digest = Sha256::digest(key.as_bytes());
    let known = config
        .api_keys
        .iter()
        .any(|candidate| digests_match(&Sha256::digest(candidate.as_bytes()), &digest));

    if !known {
        return Err(AppError::Auth("Invalid API key".to_string()));
    }
    Ok(Caller::machine(format!("api-key:{}", &hex::encode(digest)[..8])))
}

// Fixed-length digests compared without early exit.
fn digests_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn verify_signed_request(
    config: &AppConfig,
    request: Request<Body>,
) -> Result<(Caller, Request<Body>), AppError> {
    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("Request body too large".to_string()))?;

    // Nested routers see a stripped URI; sign against what the client sent.
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| parts.uri.clone());
    let path_with_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    verify_signature(
        &config.hmac_secret,
        SignedParts {
            method: parts.method.as_str(),
            path_with_query: &path_with_query,
            timestamp: header_str(&parts.headers, TIMESTAMP_HEADER),
            signature: header_str(&parts.headers, SIGNATURE_HEADER),
            body: &bytes,
        },
        Utc::now().timestamp(),
        config.signature_tolerance_seconds,
    )
    .map_err(|e| AppError::Auth(e.to_string()))?;

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok((Caller::machine(config.hmac_client_id.clone()), request))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::{Extension, Json, State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::{Caller, TokenResponse};
use shared_models::error::AppError;
use shared_utils::jwt;
use shared_utils::session::{encode_session, SESSION_COOKIE};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Exchanges machine credentials (signature or API key) for a bearer token.
pub async fn issue_token(
    State(config): State<Arc<AppConfig>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TokenResponse>, AppError> {
    if !caller.is_machine() {
        return Err(AppError::Forbidden("Tokens are only issued to machine clients".to_string()));
    }

    let (access_token, expires_in) =
        jwt::issue_token(&caller, &config.token_secret, config.token_ttl_seconds).map_err(AppError::Internal)?;
    debug!("Issued token for caller: {}", caller.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in,
    }))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Dashboard password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if !config.is_dashboard_configured() {
        return Err(AppError::Forbidden("Dashboard login is not configured".to_string()));
    }

    if request.username != config.dashboard_username
        || !verify_password(&request.password, &config.dashboard_password_hash)
    {
        debug!("Rejected dashboard login for {}", request.username);
        return Err(AppError::Auth("Invalid username or password".to_string()));
    }

    let value = encode_session(&request.username, &config.session_secret, config.session_ttl_hours)
        .map_err(AppError::Internal)?;
    let cookie = Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    debug!("Dashboard login for {}", request.username);
    Ok((
        jar.add(cookie),
        Json(json!({ "username": request.username })),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(json!({ "loggedOut": true })))
}

pub async fn session(Extension(caller): Extension<Caller>) -> Json<Caller> {
    Json(caller)
}

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;
use assert_matches::assert_matches;
use axum::extract::{Extension, Json, State};
use axum_extra::extract::cookie::CookieJar;

use auth_cell::handlers::{issue_token, login, logout, session, LoginRequest};
use shared_config::AppConfig;
use shared_models::auth::Caller;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;
use shared_utils::session::{decode_session, SESSION_COOKIE};
use shared_utils::test_utils::TestConfig;

fn dashboard_config(password: &str) -> Arc<AppConfig> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();

    TestConfig {
        dashboard_password_hash: hash,
        ..TestConfig::default()
    }
    .to_arc()
}

#[tokio::test]
async fn test_issue_token_for_machine_caller() {
    let config = TestConfig::default().to_arc();

    let response = issue_token(State(config.clone()), Extension(Caller::machine("monitor")))
        .await
        .unwrap()
        .0;

    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, config.token_ttl_seconds);
    let caller = validate_token(&response.access_token, &config.token_secret).unwrap();
    assert_eq!(caller, Caller::machine("monitor"));
}

#[tokio::test]
async fn test_issue_token_rejects_dashboard_caller() {
    let config = TestConfig::default().to_arc();

    let result = issue_token(State(config), Extension(Caller::dashboard("frontdesk"))).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let config = dashboard_config("correct horse");
    let request = LoginRequest {
        username: "frontdesk".to_string(),
        password: "correct horse".to_string(),
    };

    let (jar, body) = login(State(config.clone()), CookieJar::new(), Json(request))
        .await
        .unwrap();

    assert_eq!(body.0["username"], "frontdesk");
    let cookie = jar.get(SESSION_COOKIE).expect("session cookie set");
    assert_eq!(cookie.http_only(), Some(true));
    let claims = decode_session(cookie.value(), &config.session_secret).unwrap();
    assert_eq!(claims.username, "frontdesk");
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let config = dashboard_config("correct horse");
    let request = LoginRequest {
        username: "frontdesk".to_string(),
        password: "battery staple".to_string(),
    };

    let result = login(State(config), CookieJar::new(), Json(request)).await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn test_login_without_dashboard_configuration() {
    let config = TestConfig::default().to_arc();
    let request = LoginRequest {
        username: "frontdesk".to_string(),
        password: "anything".to_string(),
    };

    let result = login(State(config), CookieJar::new(), Json(request)).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_logout_and_session() {
    let (jar, body) = logout(CookieJar::new()).await;
    assert_eq!(body.0["loggedOut"], true);
    assert!(jar.get(SESSION_COOKIE).map(|c| c.value().is_empty()).unwrap_or(true));

    let caller = session(Extension(Caller::dashboard("frontdesk"))).await.0;
    assert_eq!(caller.id, "frontdesk");
    assert!(!caller.is_machine());
}

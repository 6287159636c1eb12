use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use auth_cell::auth_routes;
use encounter_cell::create_encounter_router;
use media_cell::{create_images_router, create_validation_router, MediaState};
use media_cell::services::ObjectStore;
use monitoring_cell::{create_monitoring_router, Notifier};
use patient_cell::create_patient_router;
use queue_cell::create_queue_router;
use queue_cell::services::AgentRunner;
use summary_cell::create_summary_router;
use shared_utils::AppState;

/// External collaborators the routers need beyond the database.
#[derive(Clone)]
pub struct Integrations {
    pub notifier: Arc<dyn Notifier>,
    pub agent: Option<Arc<dyn AgentRunner>>,
    pub object_store: Option<Arc<dyn ObjectStore>>,
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok", "database": "ok" }))),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}

pub fn create_router(state: AppState, integrations: Integrations) -> Router {
    let media = MediaState::new(state.clone(), integrations.object_store, integrations.agent.clone());

    Router::new()
        .route("/", get(|| async { "Patient intake API is running!" }))
        .route("/healthz", get(healthz))
        .with_state(state.clone())
        .nest("/auth", auth_routes(state.config.clone()))
        .nest("/patients", create_patient_router(state.clone()))
        .nest("/encounters", create_encounter_router(state.clone()))
        .nest("/queue", create_queue_router(state.clone(), integrations.agent))
        .nest("/summaries", create_summary_router(state.clone()))
        .nest("/images", create_images_router(media.clone()))
        .nest("/validation", create_validation_router(media))
        .merge(create_monitoring_router(state, integrations.notifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use monitoring_cell::services::LogNotifier;
    use shared_database::MemoryStore;
    use shared_utils::test_utils::{response_json, AuthTestUtils, TestConfig};
    use tower::ServiceExt;

    fn app_with_config() -> (Router, Arc<shared_config::AppConfig>) {
        let state = TestConfig::default().app_state(Arc::new(MemoryStore::new()));
        let config = state.config.clone();
        let router = create_router(
            state,
            Integrations {
                notifier: Arc::new(LogNotifier),
                agent: None,
                object_store: None,
            },
        );
        (router, config)
    }

    fn app() -> Router {
        app_with_config().0
    }

    #[tokio::test]
    async fn healthz_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["database"], "ok");
    }

    #[tokio::test]
    async fn resources_require_credentials() {
        for uri in ["/patients", "/queue", "/alerts", "/vm-health"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn cells_are_mounted() {
        let app = app();
        for uri in ["/patients", "/encounters", "/queue", "/summaries", "/alerts", "/server-health"] {
            let response = app
                .clone()
                .oneshot(AuthTestUtils::api_key_request("GET", uri, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn signatures_cover_the_full_request_path() {
        let (app, config) = app_with_config();

        let response = app
            .clone()
            .oneshot(AuthTestUtils::signed_request(&config, "POST", "/auth/token", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["tokenType"], "Bearer");

        let response = app
            .clone()
            .oneshot(AuthTestUtils::api_key_request("POST", "/patients", Some(json!({ "emrId": "E-1" }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(AuthTestUtils::signed_request(
                &config,
                "PATCH",
                "/patients/E-1/status",
                Some(json!({ "status": "roomed" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["status"], "ROOMED");

        let response = app
            .clone()
            .oneshot(AuthTestUtils::signed_request(&config, "GET", "/patients?limit=5", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Signed for the path inside the cell, sent to the mounted path.
        let (mut parts, body) = AuthTestUtils::signed_request(
            &config,
            "PATCH",
            "/E-1/status",
            Some(json!({ "status": "discharged" })),
        )
        .into_parts();
        parts.uri = "/patients/E-1/status".parse().unwrap();
        let response = app.oneshot(Request::from_parts(parts, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn media_without_blob_storage_is_an_error() {
        let response = app()
            .oneshot(AuthTestUtils::api_key_request("GET", "/images/ENC-1/a.png", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

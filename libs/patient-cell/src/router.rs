use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;

pub fn create_patient_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(upsert_patient).get(list_patients))
        .route("/pending", post(create_pending_patient).get(list_pending_patients))
        .route("/pending/{pending_id}", patch(update_pending_patient))
        .route("/pending/{pending_id}/promote", post(promote_pending_patient))
        .route("/{emr_id}", get(get_patient))
        .route("/{emr_id}/status", patch(update_patient_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

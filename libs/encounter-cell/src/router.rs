use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;

pub fn create_encounter_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(upsert_encounter).get(list_encounters))
        .route("/{encounter_id}", get(get_encounter))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;

pub fn create_summary_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_summary).get(list_summaries))
        .route("/{id}", get(get_summary))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

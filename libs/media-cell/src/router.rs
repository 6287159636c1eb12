use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use queue_cell::services::AgentRunner;
use shared_utils::extractor::{auth_middleware, MAX_SIGNED_BODY_BYTES};
use shared_utils::AppState;

use crate::handlers::*;
use crate::services::ObjectStore;

#[derive(Clone)]
pub struct MediaState {
    pub app: AppState,
    /// `None` when blob storage is not configured.
    pub store: Option<Arc<dyn ObjectStore>>,
    pub agent: Option<Arc<dyn AgentRunner>>,
}

impl MediaState {
    pub fn new(app: AppState, store: Option<Arc<dyn ObjectStore>>, agent: Option<Arc<dyn AgentRunner>>) -> Self {
        Self { app, store, agent }
    }
}

/// Mounted at `/images`.
pub fn create_images_router(state: MediaState) -> Router {
    let config = state.app.config.clone();

    Router::new()
        .route("/", post(upload_image))
        .route("/{*path}", get(get_image))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .layer(DefaultBodyLimit::max(MAX_SIGNED_BODY_BYTES))
        .with_state(state)
}

/// Mounted at `/validation`.
pub fn create_validation_router(state: MediaState) -> Router {
    let config = state.app.config.clone();

    Router::new()
        .route("/{queue_id}", post(validate_queue_entry))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;
use crate::services::agent::AgentRunner;

#[derive(Clone)]
pub struct QueueState {
    pub app: AppState,
    /// `None` when no agent endpoint is configured.
    pub agent: Option<Arc<dyn AgentRunner>>,
}

pub fn create_queue_router(app: AppState, agent: Option<Arc<dyn AgentRunner>>) -> Router {
    let config = app.config.clone();
    let state = QueueState { app, agent };

    Router::new()
        .route("/", get(list_queue))
        .route("/claim", post(claim_next))
        .route("/encounter/{encounter_id}", get(get_queue_entry_by_encounter))
        .route("/{queue_id}", get(get_queue_entry))
        .route("/{queue_id}/status", patch(update_queue_status))
        .route("/{queue_id}/map", post(map_queue_entry))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}

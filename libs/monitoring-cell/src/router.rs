// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers::*;
use crate::services::Notifier;

/// Routes are absolute (`/vm-health`, `/alerts`, ...) so the router is merged
/// at the root rather than nested.
pub fn create_monitoring_router(state: AppState, notifier: Arc<dyn Notifier>) -> Router {
    let handlers = Arc::new(MonitoringHandlers::new(&state, notifier));

    Router::new()
        .route("/vm-health/heartbeat", post(vm_heartbeat))
        .route("/vm-health", get(list_vm_health))
        .route("/vm-health/{vm_id}", get(get_vm_health))
        .route("/server-health/heartbeat", post(server_heartbeat))
        .route("/server-health", get(list_server_health))
        .route("/server-health/{server_id}", get(get_server_health))
        .route("/alerts", post(create_alert).get(list_alerts))
        .route("/alerts/{alert_id}/resolve", patch(resolve_alert))
        .route(
            "/experity-process-time",
            post(record_process_time).get(process_time_report),
        )
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(handlers)
}

// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    Alert, AlertListQuery, CreateAlertRequest, ProcessTime, ProcessTimeQuery, ProcessTimeReport, ProcessTimeRequest,
    ServerHealth, ServerHeartbeatRequest, ServerHeartbeatResponse, VmHealth, VmHeartbeatRequest,
};
use crate::services::{AlertManagerService, HealthMonitorService, Notifier, ProcessTimeService};

pub struct MonitoringHandlers {
    health_service: HealthMonitorService,
    alert_service: Arc<AlertManagerService>,
    process_time_service: ProcessTimeService,
}

impl MonitoringHandlers {
    pub fn new(state: &AppState, notifier: Arc<dyn Notifier>) -> Self {
        let alert_service = Arc::new(AlertManagerService::new(state.db.clone(), notifier, &state.config));
        let health_service = HealthMonitorService::new(state.db.clone(), alert_service.clone());
        let process_time_service = ProcessTimeService::new(state.db.clone());

        Self {
            health_service,
            alert_service,
            process_time_service,
        }
    }
}

type Handlers = State<Arc<MonitoringHandlers>>;

// =====================================================================================
// VM HEALTH
// =====================================================================================

#[instrument(skip(handlers, request))]
pub async fn vm_heartbeat(
    State(handlers): Handlers,
    Json(request): Json<VmHeartbeatRequest>,
) -> Result<Json<VmHealth>, AppError> {
    Ok(Json(handlers.health_service.record_vm_heartbeat(request).await?))
}

pub async fn list_vm_health(State(handlers): Handlers) -> Result<Json<Value>, AppError> {
    let vms = handlers.health_service.list_vms().await?;
    Ok(Json(json!({ "total": vms.len(), "vms": vms })))
}

pub async fn get_vm_health(
    State(handlers): Handlers,
    Path(vm_id): Path<String>,
) -> Result<Json<VmHealth>, AppError> {
    Ok(Json(handlers.health_service.get_vm(&vm_id).await?))
}

// =====================================================================================
// SERVER HEALTH
// =====================================================================================

#[instrument(skip(handlers, request))]
pub async fn server_heartbeat(
    State(handlers): Handlers,
    Json(request): Json<ServerHeartbeatRequest>,
) -> Result<Json<ServerHeartbeatResponse>, AppError> {
    Ok(Json(handlers.health_service.record_server_heartbeat(request).await?))
}

pub async fn list_server_health(State(handlers): Handlers) -> Result<Json<Value>, AppError> {
    let servers: Vec<ServerHealth> = handlers.health_service.list_servers().await?;
    Ok(Json(json!({ "total": servers.len(), "servers": servers })))
}

pub async fn get_server_health(
    State(handlers): Handlers,
    Path(server_id): Path<String>,
) -> Result<Json<ServerHealth>, AppError> {
    Ok(Json(handlers.health_service.get_server(&server_id).await?))
}

// =====================================================================================
// ALERTS
// =====================================================================================

#[instrument(skip(handlers, request))]
pub async fn create_alert(
    State(handlers): Handlers,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let (alert, created) = handlers.alert_service.create(request).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(alert)))
}

pub async fn list_alerts(
    State(handlers): Handlers,
    Query(query): Query<AlertListQuery>,
) -> Result<Json<Value>, AppError> {
    let alerts = handlers.alert_service.list(query).await?;
    Ok(Json(json!({ "total": alerts.len(), "alerts": alerts })))
}

pub async fn resolve_alert(
    State(handlers): Handlers,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, AppError> {
    let alert_id = Uuid::parse_str(alert_id.trim())
        .map_err(|_| AppError::ValidationError(format!("Invalid alert id '{}'", alert_id)))?;
    Ok(Json(handlers.alert_service.resolve(alert_id).await?))
}

// =====================================================================================
// EXPERITY PROCESS TIMES
// =====================================================================================

pub async fn record_process_time(
    State(handlers): Handlers,
    Json(request): Json<ProcessTimeRequest>,
) -> Result<(StatusCode, Json<ProcessTime>), AppError> {
    let record = handlers.process_time_service.record(request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn process_time_report(
    State(handlers): Handlers,
    Query(query): Query<ProcessTimeQuery>,
) -> Result<Json<ProcessTimeReport>, AppError> {
    Ok(Json(handlers.process_time_service.report(query).await?))
}

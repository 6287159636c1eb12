use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use shared_models::error::AppError;

use crate::models::{QueueEntry, QueueList, QueueListQuery, UpdateQueueStatusRequest};
use crate::router::QueueState;
use crate::services::queue::parse_queue_id;
use crate::services::{MappingService, QueueService};

#[axum::debug_handler]
pub async fn list_queue(
    State(state): State<QueueState>,
    Query(query): Query<QueueListQuery>,
) -> Result<Json<QueueList>, AppError> {
    let service = QueueService::new(&state.app);
    let entries = service.list(query).await?;
    Ok(Json(QueueList {
        total: entries.len(),
        entries,
    }))
}

#[axum::debug_handler]
pub async fn get_queue_entry(
    State(state): State<QueueState>,
    Path(queue_id): Path<String>,
) -> Result<Json<QueueEntry>, AppError> {
    let queue_id = parse_queue_id(&queue_id)?;
    let service = QueueService::new(&state.app);
    Ok(Json(service.get(queue_id).await?))
}

#[axum::debug_handler]
pub async fn get_queue_entry_by_encounter(
    State(state): State<QueueState>,
    Path(encounter_id): Path<String>,
) -> Result<Json<QueueEntry>, AppError> {
    let service = QueueService::new(&state.app);
    Ok(Json(service.get_by_encounter(&encounter_id).await?))
}

#[axum::debug_handler]
pub async fn update_queue_status(
    State(state): State<QueueState>,
    Path(queue_id): Path<String>,
    Json(request): Json<UpdateQueueStatusRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    let queue_id = parse_queue_id(&queue_id)?;
    let service = QueueService::new(&state.app);
    Ok(Json(service.update_status(queue_id, request).await?))
}

#[axum::debug_handler]
pub async fn claim_next(State(state): State<QueueState>) -> Result<Response, AppError> {
    let service = QueueService::new(&state.app);
    match service.claim_next().await? {
        Some(entry) => Ok(Json(entry).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[axum::debug_handler]
pub async fn map_queue_entry(
    State(state): State<QueueState>,
    Path(queue_id): Path<String>,
) -> Result<Json<QueueEntry>, AppError> {
    let queue_id = parse_queue_id(&queue_id)?;
    let service = MappingService::new(&state);
    Ok(Json(service.map_entry(queue_id).await?))
}

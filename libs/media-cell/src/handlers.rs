use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use queue_cell::services::queue::parse_queue_id;
use shared_models::error::AppError;

use crate::models::{UploadImageRequest, UploadImageResponse, ValidateRequest, ValidationResponse};
use crate::router::MediaState;
use crate::services::{ImageService, ValidationService};

#[axum::debug_handler]
pub async fn upload_image(
    State(state): State<MediaState>,
    Json(request): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<UploadImageResponse>), AppError> {
    let service = ImageService::new(state.store.clone())?;
    let uploaded = service.upload(request).await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

#[axum::debug_handler]
pub async fn get_image(State(state): State<MediaState>, Path(path): Path<String>) -> Result<Response, AppError> {
    let service = ImageService::new(state.store.clone())?;
    let image = service.fetch(&path).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

#[axum::debug_handler]
pub async fn validate_queue_entry(
    State(state): State<MediaState>,
    Path(queue_id): Path<String>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationResponse>, AppError> {
    let queue_id = parse_queue_id(&queue_id)?;
    let service = ValidationService::new(&state)?;
    Ok(Json(service.validate(queue_id, request).await?))
}

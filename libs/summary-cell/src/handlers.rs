use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{CreateSummaryRequest, Summary, SummaryList, SummaryListQuery};
use crate::services::SummaryService;

pub async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<CreateSummaryRequest>,
) -> Result<(StatusCode, Json<Summary>), AppError> {
    let summary = SummaryService::new(&state).create(request).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Summary>, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid summary id '{}'", id)))?;
    Ok(Json(SummaryService::new(&state).get(id).await?))
}

pub async fn list_summaries(
    State(state): State<AppState>,
    Query(query): Query<SummaryListQuery>,
) -> Result<Json<SummaryList>, AppError> {
    let summaries = SummaryService::new(&state).list(query).await?;
    Ok(Json(SummaryList {
        total: summaries.len(),
        summaries,
    }))
}

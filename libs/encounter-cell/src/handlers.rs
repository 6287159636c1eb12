use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{Encounter, EncounterList, EncounterListQuery, UpsertEncounterRequest};
use crate::services::EncounterService;

#[axum::debug_handler]
pub async fn upsert_encounter(
    State(state): State<AppState>,
    Json(request): Json<UpsertEncounterRequest>,
) -> Result<(StatusCode, Json<Encounter>), AppError> {
    let service = EncounterService::new(&state);
    let encounter = service.upsert_encounter(request).await?;
    Ok((StatusCode::CREATED, Json(encounter)))
}

#[axum::debug_handler]
pub async fn get_encounter(
    State(state): State<AppState>,
    Path(encounter_id): Path<String>,
) -> Result<Json<Encounter>, AppError> {
    let service = EncounterService::new(&state);
    Ok(Json(service.get_encounter(&encounter_id).await?))
}

#[axum::debug_handler]
pub async fn list_encounters(
    State(state): State<AppState>,
    Query(query): Query<EncounterListQuery>,
) -> Result<Json<EncounterList>, AppError> {
    let service = EncounterService::new(&state);
    let encounters = service.list_encounters(query).await?;
    Ok(Json(EncounterList {
        total: encounters.len(),
        encounters,
    }))
}

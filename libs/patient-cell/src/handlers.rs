use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use shared_models::auth::Caller;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    Patient, PatientList, PatientListQuery, PendingListQuery, PendingPatient, PendingPatientList,
    PendingPatientRequest, PendingPatientUpdateRequest, PromotePendingRequest, UpdateStatusRequest,
    UpsertPatientRequest,
};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn upsert_patient(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<UpsertPatientRequest>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    debug!("Patient upsert from {}", caller.id);
    let service = PatientService::new(&state);

    let patient = service.upsert_patient(request).await?;

    Ok((StatusCode::CREATED, Json(patient)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientList>, AppError> {
    let service = PatientService::new(&state);

    let patients = service.list_patients(query).await?;

    Ok(Json(PatientList {
        total: patients.len(),
        patients,
    }))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    Path(emr_id): Path<String>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&state);
    Ok(Json(service.get_patient(&emr_id).await?))
}

#[axum::debug_handler]
pub async fn update_patient_status(
    State(state): State<AppState>,
    Path(emr_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&state);
    Ok(Json(service.update_status(&emr_id, &request.status).await?))
}

#[axum::debug_handler]
pub async fn create_pending_patient(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<PendingPatientRequest>,
) -> Result<(StatusCode, Json<PendingPatient>), AppError> {
    debug!("Pending patient capture from {}", caller.id);
    let service = PatientService::new(&state);

    let pending = service.upsert_pending(request).await?;

    Ok((StatusCode::CREATED, Json(pending)))
}

#[axum::debug_handler]
pub async fn list_pending_patients(
    State(state): State<AppState>,
    Query(query): Query<PendingListQuery>,
) -> Result<Json<PendingPatientList>, AppError> {
    let service = PatientService::new(&state);

    let pending_patients = service.list_pending(query).await?;

    Ok(Json(PendingPatientList {
        total: pending_patients.len(),
        pending_patients,
    }))
}

#[axum::debug_handler]
pub async fn update_pending_patient(
    State(state): State<AppState>,
    Path(pending_id): Path<i64>,
    Json(request): Json<PendingPatientUpdateRequest>,
) -> Result<Json<PendingPatient>, AppError> {
    let service = PatientService::new(&state);
    Ok(Json(service.update_pending(pending_id, request).await?))
}

#[axum::debug_handler]
pub async fn promote_pending_patient(
    State(state): State<AppState>,
    Path(pending_id): Path<i64>,
    Json(request): Json<PromotePendingRequest>,
) -> Result<Json<Patient>, AppError> {
    let service = PatientService::new(&state);
    Ok(Json(service.promote_pending(pending_id, &request.emr_id).await?))
}

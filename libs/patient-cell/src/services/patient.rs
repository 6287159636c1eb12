use std::sync::Arc;

use tracing::{debug, info};

use shared_database::{
    Database, NewPatient, NewPendingPatient, PatientFilter, PendingFilter, PendingPatientUpdate,
};
use shared_models::status::PendingStatus;
use shared_utils::pagination::{require_text, resolve_limit, status_list};
use shared_utils::AppState;

use crate::models::{
    Patient, PatientError, PatientListQuery, PendingListQuery, PendingPatient, PendingPatientRequest,
    PendingPatientUpdateRequest, UpsertPatientRequest,
};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `pending` is the path segment of the pending-capture routes, so a patient
/// stored under it could never be read back by EMR id.
const RESERVED_EMR_ID: &str = "pending";

fn require_emr_id(value: &str) -> Result<String, PatientError> {
    let emr_id = require_text(value, "emrId")?;
    if emr_id.eq_ignore_ascii_case(RESERVED_EMR_ID) {
        return Err(PatientError::ValidationError(format!("emrId '{}' is reserved", emr_id)));
    }
    Ok(emr_id)
}

pub struct PatientService {
    db: Arc<dyn Database>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub async fn upsert_patient(&self, request: UpsertPatientRequest) -> Result<Patient, PatientError> {
        let emr_id = require_emr_id(&request.emr_id)?;
        debug!("Upserting patient {}", emr_id);

        let patient = NewPatient {
            emr_id,
            booking_id: non_blank(request.booking_id),
            booking_number: non_blank(request.booking_number),
            patient_number: non_blank(request.patient_number),
            legal_first_name: non_blank(request.legal_first_name),
            legal_last_name: non_blank(request.legal_last_name),
            dob: non_blank(request.dob),
            mobile_phone: non_blank(request.mobile_phone),
            sex_at_birth: non_blank(request.sex_at_birth),
            reason_for_visit: non_blank(request.reason_for_visit),
            location_id: non_blank(request.location_id),
            location_name: non_blank(request.location_name),
            status: non_blank(request.status).map(|s| s.to_ascii_uppercase()),
            captured_at: request.captured_at,
        };

        Ok(self.db.upsert_patient(&patient).await?.into())
    }

    pub async fn get_patient(&self, emr_id: &str) -> Result<Patient, PatientError> {
        self.db
            .get_patient(emr_id)
            .await?
            .map(Patient::from)
            .ok_or_else(|| PatientError::NotFound(emr_id.to_string()))
    }

    pub async fn list_patients(&self, query: PatientListQuery) -> Result<Vec<Patient>, PatientError> {
        let filter = PatientFilter {
            location_id: non_blank(query.location_id),
            statuses: status_list(query.status.as_deref()),
            limit: resolve_limit(query.limit)?,
        };
        debug!("Listing patients with {:?}", filter);

        let rows = self.db.list_patients(&filter).await?;
        Ok(rows.into_iter().map(Patient::from).collect())
    }

    pub async fn update_status(&self, emr_id: &str, status: &str) -> Result<Patient, PatientError> {
        let status = require_text(status, "status")?.to_ascii_uppercase();
        debug!("Updating patient {} status to {}", emr_id, status);

        self.db
            .update_patient_status(emr_id, &status)
            .await?
            .map(Patient::from)
            .ok_or_else(|| PatientError::NotFound(emr_id.to_string()))
    }

    pub async fn upsert_pending(&self, request: PendingPatientRequest) -> Result<PendingPatient, PatientError> {
        let pending = NewPendingPatient {
            booking_id: non_blank(request.booking_id),
            booking_number: non_blank(request.booking_number),
            patient_number: non_blank(request.patient_number),
            legal_first_name: non_blank(request.legal_first_name),
            legal_last_name: non_blank(request.legal_last_name),
            dob: non_blank(request.dob),
            mobile_phone: non_blank(request.mobile_phone),
            sex_at_birth: non_blank(request.sex_at_birth),
            reason_for_visit: non_blank(request.reason_for_visit),
            location_id: non_blank(request.location_id),
            location_name: non_blank(request.location_name),
            raw_payload: request.raw_payload,
        };

        let has_name = pending.legal_first_name.is_some() || pending.legal_last_name.is_some();
        if !has_name && pending.mobile_phone.is_none() {
            return Err(PatientError::ValidationError(
                "A pending patient needs a name or a phone number".to_string(),
            ));
        }

        let row = self.db.upsert_pending_patient(&pending).await?;
        debug!("Stored pending patient {}", row.pending_id);
        Ok(row.into())
    }

    pub async fn list_pending(&self, query: PendingListQuery) -> Result<Vec<PendingPatient>, PatientError> {
        let status = match non_blank(query.status) {
            Some(raw) => Some(raw.parse::<PendingStatus>().map_err(PatientError::ValidationError)?),
            None => None,
        };
        let filter = PendingFilter {
            status,
            limit: resolve_limit(query.limit)?,
        };

        let rows = self.db.list_pending_patients(&filter).await?;
        Ok(rows.into_iter().map(PendingPatient::from).collect())
    }

    pub async fn update_pending(
        &self,
        pending_id: i64,
        request: PendingPatientUpdateRequest,
    ) -> Result<PendingPatient, PatientError> {
        let status = match non_blank(request.status) {
            Some(raw) => Some(raw.parse::<PendingStatus>().map_err(PatientError::ValidationError)?),
            None => None,
        };
        let update = PendingPatientUpdate {
            status,
            emr_id: non_blank(request.emr_id).map(|id| require_emr_id(&id)).transpose()?,
            booking_id: non_blank(request.booking_id),
            booking_number: non_blank(request.booking_number),
            patient_number: non_blank(request.patient_number),
        };

        self.db
            .update_pending_patient(pending_id, &update)
            .await?
            .map(PendingPatient::from)
            .ok_or(PatientError::PendingNotFound(pending_id))
    }

    /// Completes a pending capture once its EMR id is known and creates or
    /// refreshes the patient from the captured fields.
    pub async fn promote_pending(&self, pending_id: i64, emr_id: &str) -> Result<Patient, PatientError> {
        let emr_id = require_emr_id(emr_id)?;

        let patient = self
            .db
            .promote_pending_patient(pending_id, &emr_id)
            .await?
            .ok_or(PatientError::PendingNotFound(pending_id))?;

        info!("Promoted pending patient {} to {}", pending_id, emr_id);
        Ok(patient.into())
    }
}

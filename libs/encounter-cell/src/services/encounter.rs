use std::sync::Arc;

use tracing::{debug, instrument, warn};

use shared_database::{Database, NewEncounter, NewQueueEntry};
use shared_utils::pagination::{require_text, resolve_limit};
use shared_utils::AppState;

use crate::models::{Encounter, EncounterError, EncounterListQuery, UpsertEncounterRequest};

pub struct EncounterService {
    db: Arc<dyn Database>,
}

impl EncounterService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    /// Stores the encounter, then makes sure a queue entry exists for it.
    /// Queue failures are logged and do not fail the request.
    #[instrument(skip(self, request), fields(encounter_id = %request.encounter_id))]
    pub async fn upsert_encounter(&self, request: UpsertEncounterRequest) -> Result<Encounter, EncounterError> {
        let encounter_id = require_text(&request.encounter_id, "encounterId")?;
        let emr_id = require_text(&request.emr_id, "emrId")?;
        let payload = request
            .encounter_payload
            .filter(|p| !p.is_null())
            .ok_or_else(|| EncounterError::ValidationError("encounterPayload is required".to_string()))?;

        let encounter = NewEncounter {
            encounter_id,
            emr_id,
            encounter_payload: payload,
            trace_id: request.trace_id,
            chief_complaints: request.chief_complaints,
            status: request.status,
            created_by: request.created_by,
            started_at: request.started_at,
        };
        let row = self.db.upsert_encounter(&encounter).await?;
        debug!("Stored encounter {}", row.encounter_id);

        self.ensure_queue_entry(&row.encounter_id, &row.emr_id, &row.encounter_payload)
            .await;

        Ok(row.into())
    }

    async fn ensure_queue_entry(&self, encounter_id: &str, emr_id: &str, payload: &serde_json::Value) {
        let entry = NewQueueEntry {
            encounter_id: encounter_id.to_string(),
            emr_id: Some(emr_id.to_string()),
            raw_payload: Some(payload.clone()),
        };
        match self.db.upsert_queue_entry(&entry).await {
            Ok(queued) => debug!("Queue entry {} ready for encounter {}", queued.queue_id, encounter_id),
            Err(e) => warn!("Failed to create queue entry for encounter {}: {}", encounter_id, e),
        }
    }

    pub async fn get_encounter(&self, encounter_id: &str) -> Result<Encounter, EncounterError> {
        self.db
            .get_encounter(encounter_id)
            .await?
            .map(Encounter::from)
            .ok_or_else(|| EncounterError::NotFound(encounter_id.to_string()))
    }

    pub async fn list_encounters(&self, query: EncounterListQuery) -> Result<Vec<Encounter>, EncounterError> {
        let limit = resolve_limit(query.limit)?;
        let emr_id = query.emr_id.as_deref().map(str::trim).filter(|v| !v.is_empty());

        let rows = self.db.list_encounters(emr_id, limit).await?;
        Ok(rows.into_iter().map(Encounter::from).collect())
    }
}

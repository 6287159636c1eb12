use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_database::{Database, QueueFilter};
use shared_models::status::QueueStatus;
use shared_utils::pagination::resolve_limit;
use shared_utils::AppState;

use crate::models::{QueueEntry, QueueError, QueueListQuery, UpdateQueueStatusRequest};

pub fn parse_queue_id(raw: &str) -> Result<Uuid, QueueError> {
    Uuid::parse_str(raw.trim()).map_err(|_| QueueError::ValidationError(format!("Invalid queue id '{}'", raw)))
}

pub struct QueueService {
    db: Arc<dyn Database>,
}

impl QueueService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub async fn list(&self, query: QueueListQuery) -> Result<Vec<QueueEntry>, QueueError> {
        let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<QueueStatus>().map_err(QueueError::ValidationError)?),
            None => None,
        };
        let filter = QueueFilter {
            status,
            emr_id: query.emr_id.filter(|e| !e.trim().is_empty()),
            limit: resolve_limit(query.limit)?,
        };

        let rows = self.db.list_queue(&filter).await?;
        Ok(rows.into_iter().map(QueueEntry::from).collect())
    }

    pub async fn get(&self, queue_id: Uuid) -> Result<QueueEntry, QueueError> {
        self.db
            .get_queue_entry(queue_id)
            .await?
            .map(QueueEntry::from)
            .ok_or_else(|| QueueError::NotFound(queue_id.to_string()))
    }

    pub async fn get_by_encounter(&self, encounter_id: &str) -> Result<QueueEntry, QueueError> {
        self.db
            .get_queue_entry_by_encounter(encounter_id)
            .await?
            .map(QueueEntry::from)
            .ok_or_else(|| QueueError::NotFound(format!("for encounter {}", encounter_id)))
    }

    /// Applies a validated transition. The write only lands if the stored
    /// status is still the one the transition was checked against.
    #[instrument(skip(self, request), fields(target = %request.status))]
    pub async fn update_status(
        &self,
        queue_id: Uuid,
        request: UpdateQueueStatusRequest,
    ) -> Result<QueueEntry, QueueError> {
        let target: QueueStatus = request.status.parse().map_err(QueueError::ValidationError)?;

        let current = self
            .db
            .get_queue_entry(queue_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(queue_id.to_string()))?;
        let from: QueueStatus = current.queue_status().map_err(QueueError::ValidationError)?;

        if !from.can_transition_to(&target) {
            return Err(QueueError::InvalidTransition { from, to: target });
        }
        if from == target && request.error_message.is_none() {
            debug!("Queue entry {} already {}", queue_id, target);
            return Ok(current.into());
        }

        let error_message = request
            .error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let updated = self
            .db
            .update_queue_status(queue_id, from, target, error_message)
            .await?
            .ok_or(QueueError::Conflict(queue_id))?;

        info!("Queue entry {} moved {} -> {}", queue_id, from, target);
        Ok(updated.into())
    }

    /// Hands the oldest PENDING entry to a worker.
    pub async fn claim_next(&self) -> Result<Option<QueueEntry>, QueueError> {
        let claimed = self.db.claim_next_queue_entry().await?;
        if let Some(entry) = &claimed {
            info!("Claimed queue entry {} (attempt {})", entry.queue_id, entry.attempts);
        }
        Ok(claimed.map(QueueEntry::from))
    }
}

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use shared_database::Database;
use shared_models::status::QueueStatus;

use crate::models::{QueueEntry, QueueError};
use crate::router::QueueState;
use crate::services::agent::{AgentError, AgentInput, AgentRunner};

const MAPPING_INSTRUCTIONS: &str = "Map the following encounter payload to the intake form schema. \
Reply with a single JSON object only.";

/// Turns a raw encounter payload into the structured form the EMR expects.
pub struct MappingService {
    db: Arc<dyn Database>,
    agent: Option<Arc<dyn AgentRunner>>,
    agent_id: String,
}

impl MappingService {
    pub fn new(state: &QueueState) -> Self {
        Self {
            db: state.app.db.clone(),
            agent: state.agent.clone(),
            agent_id: state.app.config.azure_ai_mapping_agent_id.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn map_entry(&self, queue_id: Uuid) -> Result<QueueEntry, QueueError> {
        let entry = self
            .db
            .get_queue_entry(queue_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(queue_id.to_string()))?;

        if entry.queue_status().ok() == Some(QueueStatus::Done) {
            return Err(QueueError::AlreadyDone(queue_id));
        }
        let raw = entry
            .raw_payload
            .as_ref()
            .ok_or_else(|| QueueError::ValidationError("Queue entry has no raw payload".to_string()))?;

        let agent = self.agent.as_ref().ok_or(AgentError::NotConfigured)?;
        let inputs = [
            AgentInput::Text(MAPPING_INSTRUCTIONS.to_string()),
            AgentInput::Text(raw.to_string()),
        ];
        let parsed = agent.run_agent(&self.agent_id, &inputs).await?;

        let updated = self
            .db
            .set_parsed_payload(queue_id, &parsed)
            .await?
            .ok_or_else(|| QueueError::NotFound(queue_id.to_string()))?;

        info!("Stored mapped payload for queue entry {}", queue_id);
        Ok(updated.into())
    }
}

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, instrument};
use uuid::Uuid;

use queue_cell::services::{AgentError, AgentInput, AgentRunner};
use shared_database::Database;

use super::image::ImageService;
use crate::models::{MediaError, ValidateRequest, ValidationResponse};
use crate::router::MediaState;

const VALIDATION_INSTRUCTIONS: &str = "Compare the mapped intake payload with the EMR screenshot. \
Reply with a single JSON object listing every field that differs.";

/// Checks what the robot typed into the EMR against the mapped payload.
pub struct ValidationService {
    db: Arc<dyn Database>,
    images: ImageService,
    agent: Option<Arc<dyn AgentRunner>>,
    agent_id: String,
}

impl ValidationService {
    pub fn new(state: &MediaState) -> Result<Self, MediaError> {
        Ok(Self {
            db: state.app.db.clone(),
            images: ImageService::new(state.store.clone())?,
            agent: state.agent.clone(),
            agent_id: state.app.config.azure_ai_validation_agent_id.clone(),
        })
    }

    #[instrument(skip(self, request))]
    pub async fn validate(&self, queue_id: Uuid, request: ValidateRequest) -> Result<ValidationResponse, MediaError> {
        let entry = self
            .db
            .get_queue_entry(queue_id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Queue entry {}", queue_id)))?;
        let parsed = entry.parsed_payload.ok_or_else(|| {
            MediaError::ValidationError("Queue entry has no mapped payload to validate".to_string())
        })?;

        let image = self.images.fetch(&request.image_path).await?;
        let agent = self.agent.as_ref().ok_or(AgentError::NotConfigured)?;

        let data_url = format!("data:{};base64,{}", image.content_type, STANDARD.encode(&image.bytes));
        let inputs = [
            AgentInput::Text(VALIDATION_INSTRUCTIONS.to_string()),
            AgentInput::Text(parsed.to_string()),
            AgentInput::ImageDataUrl(data_url),
        ];
        let result = agent.run_agent(&self.agent_id, &inputs).await?;

        self.db
            .set_validation_result(queue_id, &result)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Queue entry {}", queue_id)))?;
        info!("Stored validation result for {}", queue_id);

        Ok(ValidationResponse {
            queue_id,
            image_path: request.image_path.trim().to_string(),
            validation_result: result,
        })
    }
}

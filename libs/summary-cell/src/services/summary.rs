use std::sync::Arc;

use tracing::debug;

use shared_database::{Database, NewSummary, SummaryFilter};
use shared_utils::pagination::{require_text, resolve_limit};
use shared_utils::AppState;

use crate::models::{CreateSummaryRequest, Summary, SummaryError, SummaryListQuery};

pub struct SummaryService {
    db: Arc<dyn Database>,
}

impl SummaryService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub async fn create(&self, request: CreateSummaryRequest) -> Result<Summary, SummaryError> {
        let summary = NewSummary {
            emr_id: require_text(&request.emr_id, "emrId")?,
            encounter_id: request.encounter_id.filter(|e| !e.trim().is_empty()),
            note: require_text(&request.note, "note")?,
        };

        let row = self.db.create_summary(&summary).await?;
        debug!("Created summary {} for {}", row.id, row.emr_id);
        Ok(row.into())
    }

    pub async fn get(&self, id: i64) -> Result<Summary, SummaryError> {
        self.db
            .get_summary(id)
            .await?
            .map(Summary::from)
            .ok_or(SummaryError::NotFound(id))
    }

    pub async fn list(&self, query: SummaryListQuery) -> Result<Vec<Summary>, SummaryError> {
        let filter = SummaryFilter {
            emr_id: query.emr_id.filter(|e| !e.trim().is_empty()),
            encounter_id: query.encounter_id.filter(|e| !e.trim().is_empty()),
            limit: resolve_limit(query.limit)?,
        };
        let rows = self.db.list_summaries(&filter).await?;
        Ok(rows.into_iter().map(Summary::from).collect())
    }
}

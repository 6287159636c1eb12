use std::sync::Arc;

use tracing::debug;

use shared_database::{Database, NewProcessTime};
use shared_utils::pagination::{require_text, resolve_limit};

use crate::models::{MonitoringError, ProcessTime, ProcessTimeQuery, ProcessTimeReport, ProcessTimeRequest};

/// Durations of the intake robot's EMR workflows.
pub struct ProcessTimeService {
    db: Arc<dyn Database>,
}

impl ProcessTimeService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn record(&self, request: ProcessTimeRequest) -> Result<ProcessTime, MonitoringError> {
        let process_name = require_text(&request.process_name, "processName")?;
        if request.ended_at < request.started_at {
            return Err(MonitoringError::ValidationError(
                "endedAt must not be before startedAt".to_string(),
            ));
        }

        let record = NewProcessTime {
            process_name,
            started_at: request.started_at,
            ended_at: request.ended_at,
        };
        debug!("{} took {:.3}s", record.process_name, record.duration_seconds());

        Ok(self.db.record_process_time(&record).await?.into())
    }

    pub async fn report(&self, query: ProcessTimeQuery) -> Result<ProcessTimeReport, MonitoringError> {
        let limit = resolve_limit(query.limit)?;
        let process_name = query
            .process_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let records = self.db.list_process_times(process_name, limit).await?;
        let stats = self.db.process_time_stats(process_name).await?;

        Ok(ProcessTimeReport {
            records: records.into_iter().map(ProcessTime::from).collect(),
            stats: stats.into(),
        })
    }
}

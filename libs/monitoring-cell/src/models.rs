use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_database::{
    AlertRecord, DbError, ProcessTimeRecord, ProcessTimeStats, ServerHealthRecord, VmHealthRecord,
};
use shared_models::error::AppError;

// =====================================================================================
// RESPONSE SHAPES
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmHealth {
    pub vm_id: String,
    pub server_id: Option<String>,
    pub status: String,
    pub process_name: Option<String>,
    pub processing_queue_id: Option<Uuid>,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VmHealthRecord> for VmHealth {
    fn from(row: VmHealthRecord) -> Self {
        Self {
            vm_id: row.vm_id,
            server_id: row.server_id,
            status: row.status,
            process_name: row.process_name,
            processing_queue_id: row.processing_queue_id,
            last_heartbeat: row.last_heartbeat,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub server_id: String,
    pub hostname: Option<String>,
    pub status: String,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub metadata: Option<Value>,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServerHealthRecord> for ServerHealth {
    fn from(row: ServerHealthRecord) -> Self {
        Self {
            server_id: row.server_id,
            hostname: row.hostname,
            status: row.status,
            cpu_usage: row.cpu_usage,
            memory_usage: row.memory_usage,
            disk_usage: row.disk_usage,
            metadata: row.metadata,
            last_heartbeat: row.last_heartbeat,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Server heartbeat result with any alerts raised while evaluating it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHeartbeatResponse {
    pub server: ServerHealth,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub alert_id: Uuid,
    pub source: String,
    pub source_id: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub details: Option<Value>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<AlertRecord> for Alert {
    fn from(row: AlertRecord) -> Self {
        Self {
            alert_id: row.alert_id,
            source: row.source,
            source_id: row.source_id,
            alert_type: row.alert_type,
            severity: row.severity,
            message: row.message,
            details: row.details,
            resolved: row.resolved,
            resolved_at: row.resolved_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTime {
    pub id: i64,
    pub process_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl From<ProcessTimeRecord> for ProcessTime {
    fn from(row: ProcessTimeRecord) -> Self {
        Self {
            id: row.id,
            process_name: row.process_name,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_seconds: row.duration_seconds,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTimeSummary {
    pub count: i64,
    pub average_seconds: Option<f64>,
    pub min_seconds: Option<f64>,
    pub max_seconds: Option<f64>,
}

impl From<ProcessTimeStats> for ProcessTimeSummary {
    fn from(stats: ProcessTimeStats) -> Self {
        Self {
            count: stats.count,
            average_seconds: stats.average_seconds,
            min_seconds: stats.min_seconds,
            max_seconds: stats.max_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessTimeReport {
    pub records: Vec<ProcessTime>,
    pub stats: ProcessTimeSummary,
}

// =====================================================================================
// REQUESTS
// =====================================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmHeartbeatRequest {
    #[serde(default)]
    pub vm_id: String,
    pub server_id: Option<String>,
    #[serde(default)]
    pub status: String,
    pub process_name: Option<String>,
    pub processing_queue_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHeartbeatRequest {
    #[serde(default)]
    pub server_id: String,
    pub hostname: Option<String>,
    pub status: Option<String>,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub disk_usage: Option<f64>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub alert_type: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertListQuery {
    pub resolved: Option<bool>,
    pub severity: Option<String>,
    pub source: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTimeRequest {
    #[serde(default)]
    pub process_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTimeQuery {
    pub process_name: Option<String>,
    pub limit: Option<i64>,
}

// =====================================================================================
// ALERT RULES
// =====================================================================================

/// Which server metric a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMetric {
    Cpu,
    Memory,
    Disk,
}

impl ResourceMetric {
    pub fn read(&self, server: &ServerHealthRecord) -> Option<f64> {
        match self {
            ResourceMetric::Cpu => server.cpu_usage,
            ResourceMetric::Memory => server.memory_usage,
            ResourceMetric::Disk => server.disk_usage,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceMetric::Cpu => "CPU",
            ResourceMetric::Memory => "Memory",
            ResourceMetric::Disk => "Disk",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertRule {
    pub alert_type: &'static str,
    pub metric: ResourceMetric,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

// =====================================================================================
// ERRORS
// =====================================================================================

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<MonitoringError> for AppError {
    fn from(err: MonitoringError) -> Self {
        match err {
            MonitoringError::NotFound(_) => AppError::NotFound(err.to_string()),
            MonitoringError::ValidationError(msg) => AppError::ValidationError(msg),
            MonitoringError::Database(e) => e.into(),
        }
    }
}

impl From<AppError> for MonitoringError {
    fn from(err: AppError) -> Self {
        MonitoringError::ValidationError(match err {
            AppError::ValidationError(msg) | AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        })
    }
}

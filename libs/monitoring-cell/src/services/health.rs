// =====================================================================================
// HEALTH MONITORING SERVICE
// =====================================================================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use shared_database::{Database, ServerHeartbeat, VmHeartbeat};
use shared_models::status::VmStatus;
use shared_utils::pagination::require_text;

use super::alerts::AlertManagerService;
use crate::models::{
    MonitoringError, ServerHealth, ServerHeartbeatRequest, ServerHeartbeatResponse, VmHealth, VmHeartbeatRequest,
};

/// Alert type raised by the sweep for VMs that stop sending heartbeats.
pub const VM_STALE_ALERT: &str = "VM_STALE";

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_percentage(name: &str, value: Option<f64>) -> Result<(), MonitoringError> {
    match value {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(MonitoringError::ValidationError(format!(
            "{} must be between 0 and 100",
            name
        ))),
        _ => Ok(()),
    }
}

pub struct HealthMonitorService {
    db: Arc<dyn Database>,
    alert_manager: Arc<AlertManagerService>,
}

impl HealthMonitorService {
    pub fn new(db: Arc<dyn Database>, alert_manager: Arc<AlertManagerService>) -> Self {
        Self { db, alert_manager }
    }

    #[instrument(skip(self, request), fields(vm_id = %request.vm_id))]
    pub async fn record_vm_heartbeat(&self, request: VmHeartbeatRequest) -> Result<VmHealth, MonitoringError> {
        let vm_id = require_text(&request.vm_id, "vmId")?;
        let status = require_text(&request.status, "status")?
            .parse::<VmStatus>()
            .map_err(MonitoringError::ValidationError)?;

        let heartbeat = VmHeartbeat {
            vm_id: vm_id.clone(),
            server_id: non_blank(request.server_id),
            status,
            process_name: non_blank(request.process_name),
            processing_queue_id: request.processing_queue_id,
            at: Utc::now(),
        };
        let row = self.db.upsert_vm_health(&heartbeat).await?;
        debug!("VM {} reported {}", vm_id, row.status);

        // A fresh heartbeat ends any staleness alert for this VM.
        if let Some(stale) = self.db.find_open_alert(&vm_id, VM_STALE_ALERT).await? {
            self.db.resolve_alert(stale.alert_id).await?;
            info!("VM {} is reporting again, resolved alert {}", vm_id, stale.alert_id);
        }

        Ok(row.into())
    }

    pub async fn get_vm(&self, vm_id: &str) -> Result<VmHealth, MonitoringError> {
        self.db
            .get_vm_health(vm_id)
            .await?
            .map(VmHealth::from)
            .ok_or_else(|| MonitoringError::NotFound(format!("VM {}", vm_id)))
    }

    pub async fn list_vms(&self) -> Result<Vec<VmHealth>, MonitoringError> {
        let rows = self.db.list_vm_health().await?;
        Ok(rows.into_iter().map(VmHealth::from).collect())
    }

    #[instrument(skip(self, request), fields(server_id = %request.server_id))]
    pub async fn record_server_heartbeat(
        &self,
        request: ServerHeartbeatRequest,
    ) -> Result<ServerHeartbeatResponse, MonitoringError> {
        let server_id = require_text(&request.server_id, "serverId")?;
        check_percentage("cpuUsage", request.cpu_usage)?;
        check_percentage("memoryUsage", request.memory_usage)?;
        check_percentage("diskUsage", request.disk_usage)?;

        let heartbeat = ServerHeartbeat {
            server_id,
            hostname: non_blank(request.hostname),
            status: non_blank(request.status)
                .map(|s| s.to_ascii_uppercase())
                .unwrap_or_else(|| "HEALTHY".to_string()),
            cpu_usage: request.cpu_usage,
            memory_usage: request.memory_usage,
            disk_usage: request.disk_usage,
            metadata: request.metadata,
            at: Utc::now(),
        };
        let row = self.db.upsert_server_health(&heartbeat).await?;
        let alerts = self.alert_manager.evaluate_server(&row).await?;

        Ok(ServerHeartbeatResponse {
            server: row.into(),
            alerts: alerts.into_iter().map(Into::into).collect(),
        })
    }

    pub async fn get_server(&self, server_id: &str) -> Result<ServerHealth, MonitoringError> {
        self.db
            .get_server_health(server_id)
            .await?
            .map(ServerHealth::from)
            .ok_or_else(|| MonitoringError::NotFound(format!("Server {}", server_id)))
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerHealth>, MonitoringError> {
        let rows = self.db.list_server_health().await?;
        Ok(rows.into_iter().map(ServerHealth::from).collect())
    }
}

// =====================================================================================
// STALE VM SWEEP
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info};

use shared_database::{AlertRecord, NewAlert};
use shared_models::status::{AlertSeverity, AlertSource};
use shared_utils::AppState;

use super::alerts::AlertManagerService;
use super::health::VM_STALE_ALERT;
use super::notifier::Notifier;
use crate::models::MonitoringError;

/// Raises one CRITICAL `VM_STALE` alert per VM whose last heartbeat is older
/// than the configured window. VMs with an open alert are skipped.
pub async fn sweep_stale_vms(
    state: &AppState,
    alerts: &AlertManagerService,
) -> Result<Vec<AlertRecord>, MonitoringError> {
    let window = chrono::Duration::minutes(state.config.vm_stale_minutes);
    let cutoff = Utc::now() - window;
    let stale = state.db.list_stale_vms(cutoff).await?;

    let mut raised = Vec::new();
    for vm in stale {
        let minutes = (Utc::now() - vm.last_heartbeat).num_minutes();
        let alert = NewAlert {
            source: AlertSource::Vm,
            source_id: vm.vm_id.clone(),
            alert_type: VM_STALE_ALERT.to_string(),
            severity: AlertSeverity::Critical,
            message: format!("VM {} has not sent a heartbeat for {} minutes", vm.vm_id, minutes),
            details: Some(json!({
                "serverId": vm.server_id,
                "lastHeartbeat": vm.last_heartbeat,
                "lastStatus": vm.status,
            })),
        };
        if let Some(record) = alerts.raise_alert(&alert).await? {
            raised.push(record);
        }
    }

    Ok(raised)
}

pub fn spawn_health_sweep(state: AppState, notifier: Arc<dyn Notifier>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let alerts = AlertManagerService::new(state.db.clone(), notifier, &state.config);
        let mut ticker = tokio::time::interval(interval);
        info!("Stale VM sweep running every {}s", interval.as_secs());

        loop {
            ticker.tick().await;
            match sweep_stale_vms(&state, &alerts).await {
                Ok(raised) if !raised.is_empty() => info!("Sweep raised {} stale VM alerts", raised.len()),
                Ok(_) => {}
                Err(e) => error!("Stale VM sweep failed: {}", e),
            }
        }
    })
}

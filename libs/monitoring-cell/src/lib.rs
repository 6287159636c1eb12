// =====================================================================================
// MONITORING CELL - VM/SERVER HEALTH, ALERTS AND PROCESS TIMES
// =====================================================================================
//
// - Heartbeats from intake VMs and the servers that host them
// - Resource threshold alerts with deduplication and auto-resolve
// - Alert notification over Slack, e-mail and the service log
// - Stale heartbeat sweep
// - Experity workflow timings
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Alert, MonitoringError, ServerHealth, VmHealth};

pub use services::{
    spawn_health_sweep, AlertManagerService, CompositeNotifier, HealthMonitorService, Notifier,
};

pub use handlers::MonitoringHandlers;
pub use router::create_monitoring_router;

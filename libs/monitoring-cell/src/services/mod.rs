pub mod alerts;
pub mod health;
pub mod notifier;
pub mod process_time;
pub mod sweep;

pub use alerts::AlertManagerService;
pub use health::{HealthMonitorService, VM_STALE_ALERT};
pub use notifier::{CompositeNotifier, EmailNotifier, LogNotifier, Notifier, SlackNotifier};
pub use process_time::ProcessTimeService;
pub use sweep::{spawn_health_sweep, sweep_stale_vms};

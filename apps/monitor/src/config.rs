use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "intake-monitor")]
#[command(about = "Watches the booking site and reports captured patients to the intake API")]
#[command(version)]
pub struct MonitorConfig {
    /// Page to open and watch
    #[arg(long, env = "MONITOR_TARGET_URL")]
    pub target_url: String,

    /// Base URL of the intake API
    #[arg(long, env = "API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Shared secret used to sign API requests
    #[arg(long, env = "INTAKE_HMAC_SECRET", hide_env_values = true)]
    pub hmac_secret: String,

    /// Show the browser window instead of running headless
    #[arg(long, env = "MONITOR_HEADFUL")]
    pub headful: bool,

    /// How often pending submissions and the capture script are checked
    #[arg(long, env = "MONITOR_POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// How long a submission waits for its EMR id before it is marked failed
    #[arg(long, env = "MONITOR_PENDING_TTL_SECONDS", default_value_t = 900)]
    pub pending_ttl_seconds: i64,

    /// Clinic location attached to captured patients
    #[arg(long, env = "MONITOR_LOCATION_ID")]
    pub location_id: Option<String>,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn pending_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pending_ttl_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = MonitorConfig::try_parse_from([
            "intake-monitor",
            "--target-url",
            "https://booking.example.com",
            "--hmac-secret",
            "s3cret",
        ])
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(!config.headful);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.pending_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.location_id, None);
    }

    #[test]
    fn overrides() {
        let config = MonitorConfig::try_parse_from([
            "intake-monitor",
            "--target-url",
            "https://booking.example.com",
            "--hmac-secret",
            "s3cret",
            "--headful",
            "--poll-interval-ms",
            "10",
            "--pending-ttl-seconds",
            "60",
            "--location-id",
            "LOC-9",
            "--api-url",
            "http://api:8000",
        ])
        .unwrap();

        assert_eq!(config.api_url, "http://api:8000");
        assert!(config.headful);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.pending_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.location_id.as_deref(), Some("LOC-9"));
    }
}

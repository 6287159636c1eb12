use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,

    pub hmac_secret: String,
    pub hmac_client_id: String,
    pub signature_tolerance_seconds: i64,
    pub api_keys: Vec<String>,
    pub token_secret: String,
    pub token_ttl_seconds: i64,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub dashboard_username: String,
    pub dashboard_password_hash: String,

    pub azure_blob_container_url: String,
    pub azure_blob_sas_token: String,
    pub azure_ai_endpoint: String,
    pub azure_ai_api_key: String,
    pub azure_ai_api_version: String,
    pub azure_ai_mapping_agent_id: String,
    pub azure_ai_validation_agent_id: String,
    pub azure_ai_timeout_seconds: u64,

    pub slack_webhook_url: Option<String>,
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,

    pub alert_cpu_threshold: f64,
    pub alert_memory_threshold: f64,
    pub alert_disk_threshold: f64,
    pub alert_critical_threshold: f64,
    pub vm_stale_minutes: i64,
    pub health_sweep_interval_seconds: u64,
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn with_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_url: required("DATABASE_URL"),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10),
            bind_addr: with_default("BIND_ADDR", "0.0.0.0:8000"),

            hmac_secret: required("INTAKE_HMAC_SECRET"),
            hmac_client_id: with_default("INTAKE_HMAC_CLIENT_ID", "monitor"),
            signature_tolerance_seconds: parsed("INTAKE_SIGNATURE_TOLERANCE_SECONDS", 300),
            api_keys: env::var("INTAKE_API_KEYS")
                .map(|raw| {
                    raw.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            token_secret: required("INTAKE_TOKEN_SECRET"),
            token_ttl_seconds: parsed("INTAKE_TOKEN_TTL_SECONDS", 3600),
            session_secret: required("SESSION_SECRET"),
            session_ttl_hours: parsed("SESSION_TTL_HOURS", 12),
            dashboard_username: required("DASHBOARD_USERNAME"),
            dashboard_password_hash: required("DASHBOARD_PASSWORD_HASH"),

            azure_blob_container_url: required("AZURE_BLOB_CONTAINER_URL"),
            azure_blob_sas_token: required("AZURE_BLOB_SAS_TOKEN"),
            azure_ai_endpoint: required("AZURE_AI_ENDPOINT"),
            azure_ai_api_key: required("AZURE_AI_API_KEY"),
            azure_ai_api_version: with_default("AZURE_AI_API_VERSION", "2025-05-01"),
            azure_ai_mapping_agent_id: required("AZURE_AI_MAPPING_AGENT_ID"),
            azure_ai_validation_agent_id: required("AZURE_AI_VALIDATION_AGENT_ID"),
            azure_ai_timeout_seconds: parsed("AZURE_AI_TIMEOUT_SECONDS", 120),

            slack_webhook_url: optional("SLACK_WEBHOOK_URL"),
            email_api_url: optional("EMAIL_API_URL"),
            email_api_key: optional("EMAIL_API_KEY"),
            email_from: optional("EMAIL_FROM"),
            email_to: optional("EMAIL_TO"),

            alert_cpu_threshold: parsed("ALERT_CPU_THRESHOLD", 90.0),
            alert_memory_threshold: parsed("ALERT_MEMORY_THRESHOLD", 90.0),
            alert_disk_threshold: parsed("ALERT_DISK_THRESHOLD", 90.0),
            alert_critical_threshold: parsed("ALERT_CRITICAL_THRESHOLD", 97.0),
            vm_stale_minutes: parsed("VM_STALE_MINUTES", 5),
            health_sweep_interval_seconds: parsed("HEALTH_SWEEP_INTERVAL_SECONDS", 60),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_url.is_empty()
            && !self.hmac_secret.is_empty()
            && !self.token_secret.is_empty()
    }

    pub fn is_dashboard_configured(&self) -> bool {
        !self.session_secret.is_empty()
            && !self.dashboard_username.is_empty()
            && !self.dashboard_password_hash.is_empty()
    }

    pub fn is_blob_storage_configured(&self) -> bool {
        !self.azure_blob_container_url.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.azure_ai_endpoint.is_empty() && !self.azure_ai_api_key.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        self.email_api_url.is_some() && self.email_from.is_some() && self.email_to.is_some()
    }
}

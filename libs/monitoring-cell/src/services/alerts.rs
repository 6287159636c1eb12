// =====================================================================================
// ALERT MANAGER SERVICE
// =====================================================================================

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{AlertFilter, AlertRecord, Database, NewAlert, ServerHealthRecord};
use shared_models::status::{AlertSeverity, AlertSource};
use shared_utils::pagination::{require_text, resolve_limit};

use super::notifier::{dispatch, Notifier};
use crate::models::{Alert, AlertListQuery, AlertRule, CreateAlertRequest, MonitoringError, ResourceMetric};

pub struct AlertManagerService {
    db: Arc<dyn Database>,
    notifier: Arc<dyn Notifier>,
    alert_rules: Vec<AlertRule>,
}

impl AlertManagerService {
    pub fn new(db: Arc<dyn Database>, notifier: Arc<dyn Notifier>, config: &AppConfig) -> Self {
        let critical = config.alert_critical_threshold;
        let rule = |alert_type, metric, warning: f64| AlertRule {
            alert_type,
            metric,
            warning_threshold: warning,
            critical_threshold: critical.max(warning),
        };

        let alert_rules = vec![
            rule("CPU_HIGH", ResourceMetric::Cpu, config.alert_cpu_threshold),
            rule("MEMORY_HIGH", ResourceMetric::Memory, config.alert_memory_threshold),
            rule("DISK_HIGH", ResourceMetric::Disk, config.alert_disk_threshold),
        ];

        Self {
            db,
            notifier,
            alert_rules,
        }
    }

    /// Severity for a reading, or `None` when it is below the warning threshold.
    pub fn classify(rule: &AlertRule, value: f64) -> Option<AlertSeverity> {
        if value >= rule.critical_threshold {
            Some(AlertSeverity::Critical)
        } else if value >= rule.warning_threshold {
            Some(AlertSeverity::Warning)
        } else {
            None
        }
    }

    /// Applies every resource rule to a server heartbeat. A reading over
    /// threshold raises an alert unless one is already open for the same
    /// server and type; a reading back under threshold resolves it.
    #[instrument(skip(self, server), fields(server_id = %server.server_id))]
    pub async fn evaluate_server(&self, server: &ServerHealthRecord) -> Result<Vec<AlertRecord>, MonitoringError> {
        let mut raised = Vec::new();

        for rule in &self.alert_rules {
            let Some(value) = rule.metric.read(server) else {
                continue;
            };
            let open = self.db.find_open_alert(&server.server_id, rule.alert_type).await?;

            match (Self::classify(rule, value), open) {
                (Some(severity), None) => {
                    let alert = NewAlert {
                        source: AlertSource::Server,
                        source_id: server.server_id.clone(),
                        alert_type: rule.alert_type.to_string(),
                        severity,
                        message: format!(
                            "{} usage {:.1}% on {} exceeds {:.1}%",
                            rule.metric.label(),
                            value,
                            server.server_id,
                            rule.warning_threshold
                        ),
                        details: Some(json!({
                            "value": value,
                            "warningThreshold": rule.warning_threshold,
                            "criticalThreshold": rule.critical_threshold,
                        })),
                    };
                    if let Some(record) = self.raise_alert(&alert).await? {
                        raised.push(record);
                    }
                }
                (Some(_), Some(_)) => {
                    debug!("Alert {} already open for {}", rule.alert_type, server.server_id);
                }
                (None, Some(existing)) => {
                    info!(
                        "{} back to {:.1}% on {}, resolving alert {}",
                        rule.metric.label(),
                        value,
                        server.server_id,
                        existing.alert_id
                    );
                    self.db.resolve_alert(existing.alert_id).await?;
                }
                (None, None) => {}
            }
        }

        Ok(raised)
    }

    /// Stores the alert, logs it by severity and hands it to the notifier.
    /// Returns `None` without notifying when an unresolved alert of the same
    /// type is already open for the source.
    pub async fn raise_alert(&self, alert: &NewAlert) -> Result<Option<AlertRecord>, MonitoringError> {
        let Some(record) = self.db.create_alert(alert).await? else {
            debug!("Alert {} already open for {}", alert.alert_type, alert.source_id);
            return Ok(None);
        };

        match alert.severity {
            AlertSeverity::Critical => {
                error!(
                    alert_id = %record.alert_id,
                    source = %record.source,
                    source_id = %record.source_id,
                    "CRITICAL ALERT TRIGGERED: {}", record.message
                );
            }
            AlertSeverity::Warning => {
                warn!(
                    alert_id = %record.alert_id,
                    source_id = %record.source_id,
                    "WARNING ALERT: {}", record.message
                );
            }
            AlertSeverity::Info => {
                info!(alert_id = %record.alert_id, "INFO ALERT: {}", record.message);
            }
        }

        dispatch(self.notifier.clone(), record.clone());
        Ok(Some(record))
    }

    /// Creates an alert from the API. The boolean is false when an open alert
    /// for the same source and type already existed and was returned instead.
    pub async fn create(&self, request: CreateAlertRequest) -> Result<(Alert, bool), MonitoringError> {
        let source = require_text(&request.source, "source")?
            .parse::<AlertSource>()
            .map_err(MonitoringError::ValidationError)?;
        let severity = require_text(&request.severity, "severity")?
            .parse::<AlertSeverity>()
            .map_err(MonitoringError::ValidationError)?;

        let alert = NewAlert {
            source,
            source_id: require_text(&request.source_id, "sourceId")?,
            alert_type: require_text(&request.alert_type, "alertType")?.to_ascii_uppercase(),
            severity,
            message: require_text(&request.message, "message")?,
            details: request.details,
        };

        if let Some(record) = self.raise_alert(&alert).await? {
            return Ok((record.into(), true));
        }

        let existing = self
            .db
            .find_open_alert(&alert.source_id, &alert.alert_type)
            .await?
            .ok_or_else(|| MonitoringError::NotFound(format!("Open {} alert", alert.alert_type)))?;
        Ok((existing.into(), false))
    }

    pub async fn list(&self, query: AlertListQuery) -> Result<Vec<Alert>, MonitoringError> {
        let severity = match query.severity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<AlertSeverity>().map_err(MonitoringError::ValidationError)?),
            None => None,
        };
        let source = match query.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<AlertSource>().map_err(MonitoringError::ValidationError)?),
            None => None,
        };

        let filter = AlertFilter {
            resolved: query.resolved,
            severity,
            source,
            limit: resolve_limit(query.limit)?,
        };

        let rows = self.db.list_alerts(&filter).await?;
        Ok(rows.into_iter().map(Alert::from).collect())
    }

    pub async fn resolve(&self, alert_id: Uuid) -> Result<Alert, MonitoringError> {
        let alert = self
            .db
            .resolve_alert(alert_id)
            .await?
            .ok_or_else(|| MonitoringError::NotFound(format!("Alert {}", alert_id)))?;

        info!("Resolved alert {}", alert_id);
        Ok(alert.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::MockNotifier;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use shared_database::{AlertStore, HealthStore, MemoryStore, ServerHeartbeat};
    use shared_utils::test_utils::TestConfig;

    fn quiet_notifier() -> Arc<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_name().return_const("mock");
        notifier.expect_notify().returning(|_| Ok(()));
        Arc::new(notifier)
    }

    fn manager(db: Arc<MemoryStore>) -> AlertManagerService {
        let config = TestConfig::default().to_app_config();
        AlertManagerService::new(db, quiet_notifier(), &config)
    }

    async fn heartbeat(db: &MemoryStore, cpu: f64) -> ServerHealthRecord {
        db.upsert_server_health(&ServerHeartbeat {
            server_id: "srv-1".to_string(),
            hostname: None,
            status: "HEALTHY".to_string(),
            cpu_usage: Some(cpu),
            memory_usage: Some(10.0),
            disk_usage: None,
            metadata: None,
            at: Utc::now(),
        })
        .await
        .unwrap()
    }

    #[test]
    fn classifies_against_thresholds() {
        let rule = AlertRule {
            alert_type: "CPU_HIGH",
            metric: ResourceMetric::Cpu,
            warning_threshold: 90.0,
            critical_threshold: 97.0,
        };
        assert_eq!(AlertManagerService::classify(&rule, 89.9), None);
        assert_eq!(AlertManagerService::classify(&rule, 90.0), Some(AlertSeverity::Warning));
        assert_eq!(AlertManagerService::classify(&rule, 97.0), Some(AlertSeverity::Critical));
    }

    #[tokio::test]
    async fn raises_once_then_resolves() {
        let db = Arc::new(MemoryStore::new());
        let alerts = manager(db.clone());

        let server = heartbeat(&db, 95.0).await;
        let raised = alerts.evaluate_server(&server).await.unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].alert_type, "CPU_HIGH");
        assert_eq!(raised[0].severity, "WARNING");

        let server = heartbeat(&db, 99.0).await;
        assert!(alerts.evaluate_server(&server).await.unwrap().is_empty());

        let server = heartbeat(&db, 40.0).await;
        alerts.evaluate_server(&server).await.unwrap();
        assert!(db.find_open_alert("srv-1", "CPU_HIGH").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_unknown_severity() {
        let alerts = manager(Arc::new(MemoryStore::new()));
        let result = alerts
            .create(CreateAlertRequest {
                source: "monitor".to_string(),
                source_id: "vm-1".to_string(),
                alert_type: "login_failed".to_string(),
                severity: "urgent".to_string(),
                message: "Login failed".to_string(),
                details: None,
            })
            .await;
        assert_matches!(result, Err(MonitoringError::ValidationError(_)));
    }

    #[tokio::test]
    async fn concurrent_raises_store_one_alert() {
        let db = Arc::new(MemoryStore::new());
        let alerts = manager(db.clone());
        let alert = NewAlert {
            source: AlertSource::Vm,
            source_id: "vm-3".to_string(),
            alert_type: "VM_STALE".to_string(),
            severity: AlertSeverity::Critical,
            message: "VM vm-3 is silent".to_string(),
            details: None,
        };

        let (a, b, c) = tokio::join!(alerts.raise_alert(&alert), alerts.raise_alert(&alert), alerts.raise_alert(&alert));
        let stored = [a.unwrap(), b.unwrap(), c.unwrap()].into_iter().flatten().count();
        assert_eq!(stored, 1);

        let open = db
            .list_alerts(&AlertFilter {
                resolved: Some(false),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn create_returns_the_open_alert_for_duplicates() {
        let alerts = manager(Arc::new(MemoryStore::new()));
        let request = || CreateAlertRequest {
            source: "monitor".to_string(),
            source_id: "vm-1".to_string(),
            alert_type: "login_failed".to_string(),
            severity: "warning".to_string(),
            message: "Login failed".to_string(),
            details: None,
        };

        let (first, created) = alerts.create(request()).await.unwrap();
        assert!(created);
        let (second, created) = alerts.create(request()).await.unwrap();
        assert!(!created);
        assert_eq!(first.alert_id, second.alert_id);
    }

    #[tokio::test]
    async fn resolve_unknown_alert_is_not_found() {
        let alerts = manager(Arc::new(MemoryStore::new()));
        assert_matches!(alerts.resolve(Uuid::new_v4()).await, Err(MonitoringError::NotFound(_)));
    }
}

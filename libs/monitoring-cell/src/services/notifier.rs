// =====================================================================================
// ALERT NOTIFIERS
// =====================================================================================

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, warn};

use shared_config::AppConfig;
use shared_database::AlertRecord;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, alert: &AlertRecord) -> Result<()>;
}

fn headline(alert: &AlertRecord) -> String {
    format!(
        "[{}] {} {} on {}: {}",
        alert.severity, alert.source, alert.alert_type, alert.source_id, alert.message
    )
}

/// Writes alerts to the service log. Always part of the composite.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &AlertRecord) -> Result<()> {
        match alert.severity.as_str() {
            "CRITICAL" => error!(alert_id = %alert.alert_id, "CRITICAL ALERT: {}", headline(alert)),
            "WARNING" => warn!(alert_id = %alert.alert_id, "WARNING ALERT: {}", headline(alert)),
            _ => info!(alert_id = %alert.alert_id, "INFO ALERT: {}", headline(alert)),
        }
        Ok(())
    }
}

pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, alert: &AlertRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": headline(alert) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Slack webhook returned {}", response.status()));
        }
        Ok(())
    }
}

/// Sends alerts through an HTTP mail API (`POST {from, to, subject, text}`).
pub struct EmailNotifier {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
    to: Vec<String>,
}

impl EmailNotifier {
    pub fn new(api_url: String, api_key: Option<String>, from: String, to: &str) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
            from,
            to: to
                .split(',')
                .map(|addr| addr.trim().to_string())
                .filter(|addr| !addr.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, alert: &AlertRecord) -> Result<()> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": self.to,
            "subject": format!("[{}] {} on {}", alert.severity, alert.alert_type, alert.source_id),
            "text": headline(alert),
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Mail API returned {}", response.status()));
        }
        Ok(())
    }
}

/// Fans an alert out to every configured channel. One failing channel does
/// not stop the others.
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];

        if let Some(url) = &config.slack_webhook_url {
            notifiers.push(Arc::new(SlackNotifier::new(url.clone())));
        }
        if config.is_email_configured() {
            if let (Some(url), Some(from), Some(to)) = (&config.email_api_url, &config.email_from, &config.email_to) {
                notifiers.push(Arc::new(EmailNotifier::new(
                    url.clone(),
                    config.email_api_key.clone(),
                    from.clone(),
                    to,
                )));
            }
        }

        info!(
            "Alert notifiers: {}",
            notifiers.iter().map(|n| n.name()).collect::<Vec<_>>().join(", ")
        );
        Self { notifiers }
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn notify(&self, alert: &AlertRecord) -> Result<()> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(alert).await {
                warn!("Notifier {} failed for alert {}: {}", notifier.name(), alert.alert_id, e);
                failures.push(notifier.name());
            }
        }

        if !failures.is_empty() && failures.len() == self.notifiers.len() {
            return Err(anyhow!("all notifiers failed: {}", failures.join(", ")));
        }
        Ok(())
    }
}

/// Sends the alert on a background task; the caller never waits on delivery.
pub fn dispatch(notifier: Arc<dyn Notifier>, alert: AlertRecord) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&alert).await {
            warn!("Alert {} notification failed: {}", alert.alert_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> AlertRecord {
        AlertRecord {
            alert_id: Uuid::new_v4(),
            source: "SERVER".to_string(),
            source_id: "srv-1".to_string(),
            alert_type: "CPU_HIGH".to_string(),
            severity: "WARNING".to_string(),
            message: "CPU usage 93.0%".to_string(),
            details: None,
            resolved: false,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn slack_posts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({ "text": "[WARNING] SERVER CPU_HIGH on srv-1: CPU usage 93.0%" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let slack = SlackNotifier::new(format!("{}/hook", server.uri()));
        tokio_test::assert_ok!(slack.notify(&alert()).await);
    }

    #[tokio::test]
    async fn email_posts_to_mail_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(json!({ "to": ["ops@example.com", "oncall@example.com"] })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let email = EmailNotifier::new(
            format!("{}/send", server.uri()),
            Some("mail-key".to_string()),
            "alerts@example.com".to_string(),
            "ops@example.com, oncall@example.com",
        );
        tokio_test::assert_ok!(email.notify(&alert()).await);
    }

    #[tokio::test]
    async fn composite_tolerates_partial_failure() {
        let mut failing = MockNotifier::new();
        failing.expect_name().return_const("failing");
        failing
            .expect_notify()
            .times(1)
            .returning(|_| Err(anyhow!("down")));

        let mut working = MockNotifier::new();
        working.expect_name().return_const("working");
        working.expect_notify().times(1).returning(|_| Ok(()));

        let composite = CompositeNotifier::new(vec![Arc::new(failing), Arc::new(working)]);
        tokio_test::assert_ok!(composite.notify(&alert()).await);
    }

    #[tokio::test]
    async fn composite_reports_total_failure() {
        let mut failing = MockNotifier::new();
        failing.expect_name().return_const("failing");
        failing.expect_notify().returning(|_| Err(anyhow!("down")));

        let composite = CompositeNotifier::new(vec![Arc::new(failing)]);
        tokio_test::assert_err!(composite.notify(&alert()).await);
    }

    #[test]
    fn from_config_adds_configured_channels() {
        let mut config = shared_utils::test_utils::TestConfig::default().to_app_config();
        assert_eq!(CompositeNotifier::from_config(&config).channels(), vec!["log"]);

        config.slack_webhook_url = Some("http://localhost/hook".to_string());
        config.email_api_url = Some("http://localhost/send".to_string());
        config.email_from = Some("a@example.com".to_string());
        config.email_to = Some("b@example.com".to_string());
        assert_eq!(
            CompositeNotifier::from_config(&config).channels(),
            vec!["log", "slack", "email"]
        );
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use shared_models::status::PendingStatus;

use crate::browser::BrowserSession;
use crate::client::{ApiClient, IntakeApi, PatientPayload};
use crate::config::MonitorConfig;
use crate::correlator::Correlator;
use crate::events::{BrowserEvent, MonitorEvent, PendingSubmission};

fn submission_payload(submission: &PendingSubmission, location_id: Option<&str>) -> PatientPayload {
    PatientPayload {
        emr_id: None,
        booking_id: submission.booking_id.clone(),
        legal_first_name: submission.first_name.clone(),
        legal_last_name: submission.last_name.clone(),
        dob: submission.dob.clone(),
        mobile_phone: submission.phone.clone(),
        sex_at_birth: submission.sex_at_birth.clone(),
        reason_for_visit: submission.reason_for_visit.clone(),
        location_id: location_id.map(str::to_string),
        status: None,
        captured_at: Some(submission.captured_at),
        raw_payload: Some(Value::Object(submission.fields.clone())),
    }
}

/// Feeds browser observations through the correlator and reports the results
/// to the API. API failures are logged; they never stop the monitor.
pub struct Monitor {
    api: Arc<dyn IntakeApi>,
    correlator: Correlator,
    location_id: Option<String>,
    /// Submission id -> pending id assigned by the API.
    pending_ids: HashMap<u64, i64>,
}

impl Monitor {
    pub fn new(api: Arc<dyn IntakeApi>, pending_ttl: chrono::Duration, location_id: Option<String>) -> Self {
        Self {
            api,
            correlator: Correlator::new(pending_ttl),
            location_id,
            pending_ids: HashMap::new(),
        }
    }

    pub async fn handle_browser_event(&mut self, event: BrowserEvent, now: DateTime<Utc>) {
        let events = match event {
            BrowserEvent::FormSubmitted { fields, captured_at } => self.correlator.record_submission(fields, captured_at),
            BrowserEvent::RequestBody { url, body } | BrowserEvent::ResponseBody { url, body } => {
                debug!("Inspecting payload from {}", url);
                self.correlator.observe_payload(&body, now)
            }
        };

        for event in events {
            self.handle_monitor_event(event).await;
        }
    }

    pub async fn handle_monitor_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::PendingCaptured(submission) => {
                let payload = submission_payload(&submission, self.location_id.as_deref());
                match self.api.create_pending(&payload).await {
                    Ok(pending_id) => {
                        info!("Submission {} stored as pending patient {}", submission.id, pending_id);
                        self.pending_ids.insert(submission.id, pending_id);
                    }
                    Err(e) => error!("Failed to store submission {}: {}", submission.id, e),
                }
            }
            MonitorEvent::PatientIdentified {
                submission,
                emr_id,
                booking_id,
                matched_by,
            } => {
                info!("Submission {} matched EMR {} by {:?}", submission.id, emr_id, matched_by);

                if let Some(pending_id) = self.pending_ids.remove(&submission.id) {
                    match self.api.promote_pending(pending_id, &emr_id).await {
                        Ok(()) => return,
                        Err(e) => warn!("Failed to promote pending patient {}: {}; upserting instead", pending_id, e),
                    }
                }

                let mut payload = submission_payload(&submission, self.location_id.as_deref());
                payload.emr_id = Some(emr_id.clone());
                payload.booking_id = booking_id.or(payload.booking_id);
                if let Err(e) = self.api.upsert_patient(&payload).await {
                    error!("Failed to upsert patient {}: {}", emr_id, e);
                }
            }
            MonitorEvent::StatusChanged { emr_id, status, .. } => {
                debug!("Patient {} status -> {}", emr_id, status);
                if let Err(e) = self.api.update_patient_status(&emr_id, &status).await {
                    error!("Failed to update status of patient {}: {}", emr_id, e);
                    self.correlator.forget_status(&emr_id, &status);
                }
            }
        }
    }

    /// Marks submissions that never received an EMR id as failed.
    pub async fn expire(&mut self, now: DateTime<Utc>) {
        for submission in self.correlator.expire(now) {
            let Some(pending_id) = self.pending_ids.remove(&submission.id) else {
                warn!("Submission {} expired before it was stored", submission.id);
                continue;
            };

            warn!("Pending patient {} expired without an EMR id", pending_id);
            if let Err(e) = self.api.update_pending_status(pending_id, PendingStatus::Failed).await {
                error!("Failed to mark pending patient {} as failed: {}", pending_id, e);
            }
        }
    }
}

pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let api: Arc<dyn IntakeApi> = Arc::new(
        ApiClient::new(&config.api_url, config.hmac_secret.clone()).context("building API client")?,
    );

    let (tx, mut rx) = mpsc::channel(256);
    let browser = BrowserSession::launch(config.headful, tx)
        .await
        .context("launching browser")?;
    browser
        .navigate(&config.target_url)
        .await
        .with_context(|| format!("opening {}", config.target_url))?;

    let mut monitor = Monitor::new(api, config.pending_ttl(), config.location_id.clone());
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => monitor.handle_browser_event(event, Utc::now()).await,
                None => {
                    warn!("Browser event stream closed");
                    break;
                }
            },
            _ = ticker.tick() => {
                monitor.expire(Utc::now()).await;
                match browser.ensure_capture_installed().await {
                    Ok(true) => info!("Capture script reinstalled"),
                    Ok(false) => {}
                    Err(e) => warn!("Capture script check failed: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    browser.close().await;
    Ok(())
}

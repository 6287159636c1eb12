use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{http::StatusCode, Router};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use monitoring_cell::services::{sweep_stale_vms, AlertManagerService};
use monitoring_cell::{create_monitoring_router, Notifier};
use shared_database::{AlertRecord, AlertStore, MemoryStore};
use shared_utils::test_utils::{response_json, AuthTestUtils, TestConfig};
use shared_utils::AppState;

/// Forwards every notified alert to a channel so tests can await delivery.
struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AlertRecord>,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn notify(&self, alert: &AlertRecord) -> Result<()> {
        let _ = self.tx.send(alert.clone());
        Ok(())
    }
}

struct Harness {
    app: Router,
    state: AppState,
    store: Arc<MemoryStore>,
    notifier: Arc<dyn Notifier>,
    notified: mpsc::UnboundedReceiver<AlertRecord>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let state = TestConfig::default().app_state(store.clone());
    let (tx, notified) = mpsc::unbounded_channel();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier { tx });

    Harness {
        app: create_monitoring_router(state.clone(), notifier.clone()),
        state,
        store,
        notifier,
        notified,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(AuthTestUtils::api_key_request(method, uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response).await)
}

async fn next_notification(rx: &mut mpsc::UnboundedReceiver<AlertRecord>) -> AlertRecord {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification not delivered")
        .expect("notifier channel closed")
}

#[tokio::test]
async fn test_vm_heartbeat_round_trip() {
    let h = harness();

    let (status, vm) = send(
        &h.app,
        "POST",
        "/vm-health/heartbeat",
        Some(json!({ "vmId": "vm-1", "serverId": "srv-1", "status": "healthy", "processName": "intake" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vm["vmId"], "vm-1");
    assert_eq!(vm["status"], "HEALTHY");

    let (status, fetched) = send(&h.app, "GET", "/vm-health/vm-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["serverId"], "srv-1");

    let (_, list) = send(&h.app, "GET", "/vm-health", None).await;
    assert_eq!(list["total"], 1);

    let (status, _) = send(&h.app, "GET", "/vm-health/vm-404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vm_heartbeat_validation() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        "POST",
        "/vm-health/heartbeat",
        Some(json!({ "vmId": "vm-1", "status": "sleepy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("sleepy"));

    let (status, _) = send(&h.app, "POST", "/vm-health/heartbeat", Some(json!({ "status": "IDLE" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_server_heartbeat_raises_and_resolves_alerts() {
    let mut h = harness();

    let (status, body) = send(
        &h.app,
        "POST",
        "/server-health/heartbeat",
        Some(json!({ "serverId": "srv-1", "cpuUsage": 98.5, "memoryUsage": 91.0, "diskUsage": 20.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["status"], "HEALTHY");
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().any(|a| a["alertType"] == "CPU_HIGH" && a["severity"] == "CRITICAL"));
    assert!(alerts.iter().any(|a| a["alertType"] == "MEMORY_HIGH" && a["severity"] == "WARNING"));

    next_notification(&mut h.notified).await;
    next_notification(&mut h.notified).await;

    // Still hot: nothing new.
    let (_, body) = send(
        &h.app,
        "POST",
        "/server-health/heartbeat",
        Some(json!({ "serverId": "srv-1", "cpuUsage": 99.0, "memoryUsage": 92.0 })),
    )
    .await;
    assert!(body["alerts"].as_array().unwrap().is_empty());

    // CPU recovers.
    send(
        &h.app,
        "POST",
        "/server-health/heartbeat",
        Some(json!({ "serverId": "srv-1", "cpuUsage": 30.0, "memoryUsage": 92.0 })),
    )
    .await;
    assert!(h.store.find_open_alert("srv-1", "CPU_HIGH").await.unwrap().is_none());
    assert!(h.store.find_open_alert("srv-1", "MEMORY_HIGH").await.unwrap().is_some());

    let (_, open) = send(&h.app, "GET", "/alerts?resolved=false", None).await;
    assert_eq!(open["total"], 1);
}

#[tokio::test]
async fn test_server_heartbeat_rejects_out_of_range_metrics() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        "POST",
        "/server-health/heartbeat",
        Some(json!({ "serverId": "srv-1", "diskUsage": 140.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "diskUsage must be between 0 and 100");

    let (status, _) = send(&h.app, "GET", "/server-health/srv-1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_list_and_resolve_alert() {
    let mut h = harness();

    let (status, alert) = send(
        &h.app,
        "POST",
        "/alerts",
        Some(json!({
            "source": "monitor",
            "sourceId": "vm-2",
            "alertType": "login_failed",
            "severity": "warning",
            "message": "EMR login failed",
            "details": { "attempt": 3 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alert["source"], "MONITOR");
    assert_eq!(alert["alertType"], "LOGIN_FAILED");
    assert_eq!(alert["resolved"], false);
    assert_eq!(next_notification(&mut h.notified).await.source_id, "vm-2");

    // Same source and type while still open: the existing alert comes back.
    let (status, duplicate) = send(
        &h.app,
        "POST",
        "/alerts",
        Some(json!({
            "source": "monitor",
            "sourceId": "vm-2",
            "alertType": "LOGIN_FAILED",
            "severity": "critical",
            "message": "EMR login failed again"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(duplicate["alertId"], alert["alertId"]);
    assert_eq!(duplicate["severity"], "WARNING");

    let (_, warnings) = send(&h.app, "GET", "/alerts?severity=WARNING&source=MONITOR", None).await;
    assert_eq!(warnings["total"], 1);

    let alert_id = alert["alertId"].as_str().unwrap();
    let (status, resolved) = send(&h.app, "PATCH", &format!("/alerts/{}/resolve", alert_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["resolved"], true);
    assert!(resolved["resolvedAt"].is_string());

    let (status, _) = send(
        &h.app,
        "PATCH",
        "/alerts/6f1c4a52-8a51-4a0e-9a61-0d5d3f0f7d11/resolve",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.app, "PATCH", "/alerts/nope/resolve", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_time_report() {
    let h = harness();
    let start = Utc::now() - ChronoDuration::minutes(10);

    for seconds in [30, 90] {
        let (status, _) = send(
            &h.app,
            "POST",
            "/experity-process-time",
            Some(json!({
                "processName": "patient-lookup",
                "startedAt": start,
                "endedAt": start + ChronoDuration::seconds(seconds),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, report) = send(&h.app, "GET", "/experity-process-time?processName=patient-lookup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["records"].as_array().unwrap().len(), 2);
    assert_eq!(report["stats"]["count"], 2);
    assert_eq!(report["stats"]["averageSeconds"], 60.0);
    assert_eq!(report["stats"]["minSeconds"], 30.0);
    assert_eq!(report["stats"]["maxSeconds"], 90.0);

    let (status, _) = send(
        &h.app,
        "POST",
        "/experity-process-time",
        Some(json!({
            "processName": "patient-lookup",
            "startedAt": start,
            "endedAt": start - ChronoDuration::seconds(1),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stale_vm_sweep_alerts_once_and_heartbeat_resolves() {
    let mut h = harness();
    send(&h.app, "POST", "/vm-health/heartbeat", Some(json!({ "vmId": "vm-9", "status": "IDLE" }))).await;
    h.store.backdate_vm("vm-9", Utc::now() - ChronoDuration::minutes(30)).await;

    let alerts = AlertManagerService::new(h.state.db.clone(), h.notifier.clone(), &h.state.config);
    let raised = sweep_stale_vms(&h.state, &alerts).await.unwrap();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].alert_type, "VM_STALE");
    assert_eq!(raised[0].severity, "CRITICAL");
    assert_eq!(raised[0].source, "VM");
    assert_eq!(next_notification(&mut h.notified).await.source_id, "vm-9");

    assert!(sweep_stale_vms(&h.state, &alerts).await.unwrap().is_empty());

    send(&h.app, "POST", "/vm-health/heartbeat", Some(json!({ "vmId": "vm-9", "status": "HEALTHY" }))).await;
    assert!(h.store.find_open_alert("vm-9", "VM_STALE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_requires_credentials() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/alerts")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

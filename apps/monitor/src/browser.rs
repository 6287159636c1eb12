//! Chrome DevTools driver: opens the target page, injects the capture script
//! and forwards what it observes as [`BrowserEvent`]s.

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetRequestPostDataParams, GetResponseBodyParams, PostDataEntry,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{BrowserEvent, CapturePayload};

pub const CAPTURE_BINDING: &str = "__intakeCapture";
pub const CAPTURE_SCRIPT: &str = include_str!("script.js");

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Invalid browser configuration: {0}")]
    Config(String),

    #[error("DevTools error: {0}")]
    Cdp(#[from] CdpError),
}

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    tasks: Vec<JoinHandle<()>>,
}

impl BrowserSession {
    /// Launches Chrome, prepares a page for capture and starts forwarding
    /// events into `events`. Navigation is left to the caller.
    pub async fn launch(headful: bool, events: mpsc::Sender<BrowserEvent>) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder();
        if headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Config)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler error: {}", e);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;
        page.execute(AddBindingParams::new(CAPTURE_BINDING)).await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(CAPTURE_SCRIPT))
            .await?;

        let mut tasks = vec![handler_task];
        tasks.push(spawn_binding_listener(&page, events.clone()).await?);
        tasks.push(spawn_request_listener(&page, events.clone()).await?);
        tasks.push(spawn_response_listener(&page, events).await?);

        info!("Browser launched ({})", if headful { "headful" } else { "headless" });
        Ok(Self { browser, page, tasks })
    }

    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    /// Re-evaluates the capture script when the page has loaded but the script
    /// is missing, e.g. after a client-side navigation replaced the document.
    /// Returns whether the script had to be reinstalled.
    pub async fn ensure_capture_installed(&self) -> Result<bool, BrowserError> {
        let ready_state: String = self
            .page
            .evaluate("document.readyState")
            .await?
            .into_value()
            .unwrap_or_default();
        if ready_state != "complete" && ready_state != "interactive" {
            return Ok(false);
        }

        let installed: bool = self
            .page
            .evaluate("window.__intakeInstalled === true")
            .await?
            .into_value()
            .unwrap_or(false);
        if installed {
            return Ok(false);
        }

        debug!("Capture script missing; reinstalling");
        self.page.evaluate(CAPTURE_SCRIPT).await?;
        Ok(true)
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Parses the JSON handed to the capture binding.
pub fn parse_capture(payload: &str) -> Option<BrowserEvent> {
    match serde_json::from_str::<CapturePayload>(payload) {
        Ok(capture) => Some(BrowserEvent::FormSubmitted {
            fields: capture.fields,
            captured_at: capture.captured_at.unwrap_or_else(Utc::now),
        }),
        Err(e) => {
            warn!("Ignoring malformed capture payload: {}", e);
            None
        }
    }
}

/// Decodes a response body as returned by `Network.getResponseBody`.
pub fn decode_body(body: &str, base64_encoded: bool) -> Option<Value> {
    if base64_encoded {
        let bytes = general_purpose::STANDARD.decode(body).ok()?;
        serde_json::from_slice(&bytes).ok()
    } else {
        serde_json::from_str(body).ok()
    }
}

/// Decodes the base64 chunks of a request body as reported in
/// `Request.postDataEntries`.
pub fn decode_post_data_entries(entries: &[PostDataEntry]) -> Option<Value> {
    let mut bytes = Vec::new();
    for chunk in entries.iter().filter_map(|entry| entry.bytes.as_ref()) {
        let encoded: &str = chunk.as_ref();
        bytes.extend(general_purpose::STANDARD.decode(encoded).ok()?);
    }
    serde_json::from_slice(&bytes).ok()
}

fn is_json_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime.contains("application/json") || mime.ends_with("+json")
}

async fn spawn_binding_listener(
    page: &Page,
    events: mpsc::Sender<BrowserEvent>,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut calls = page.event_listener::<EventBindingCalled>().await?;
    Ok(tokio::spawn(async move {
        while let Some(call) = calls.next().await {
            if call.name != CAPTURE_BINDING {
                continue;
            }
            if let Some(event) = parse_capture(&call.payload) {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }
    }))
}

async fn spawn_request_listener(
    page: &Page,
    events: mpsc::Sender<BrowserEvent>,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        while let Some(sent) = requests.next().await {
            let body = match sent.request.post_data_entries.as_deref() {
                Some(entries) if !entries.is_empty() => decode_post_data_entries(entries),
                // Large bodies are left out of the event and fetched separately.
                _ if sent.request.has_post_data == Some(true) => {
                    match page.execute(GetRequestPostDataParams::new(sent.request_id.clone())).await {
                        Ok(response) => serde_json::from_str(&response.result.post_data).ok(),
                        Err(e) => {
                            debug!("Could not read request body for {}: {}", sent.request.url, e);
                            None
                        }
                    }
                }
                _ => None,
            };
            let Some(body) = body else {
                continue;
            };
            let event = BrowserEvent::RequestBody {
                url: sent.request.url.clone(),
                body,
            };
            if events.send(event).await.is_err() {
                break;
            }
        }
    }))
}

async fn spawn_response_listener(
    page: &Page,
    events: mpsc::Sender<BrowserEvent>,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let mut failed = page.event_listener::<EventLoadingFailed>().await?;
    let page = page.clone();

    Ok(tokio::spawn(async move {
        // JSON responses seen so far, by request id, waiting for their body.
        let mut json_requests = HashMap::new();

        loop {
            tokio::select! {
                biased;

                Some(received) = responses.next() => {
                    if is_json_mime(&received.response.mime_type) {
                        json_requests.insert(received.request_id.clone(), received.response.url.clone());
                    }
                }
                Some(done) = finished.next() => {
                    let Some(url) = json_requests.remove(&done.request_id) else {
                        continue;
                    };
                    let body = match page.execute(GetResponseBodyParams::new(done.request_id.clone())).await {
                        Ok(response) => decode_body(&response.result.body, response.result.base64_encoded),
                        Err(e) => {
                            debug!("Could not read response body for {}: {}", url, e);
                            None
                        }
                    };
                    if let Some(body) = body {
                        if events.send(BrowserEvent::ResponseBody { url, body }).await.is_err() {
                            break;
                        }
                    }
                }
                Some(lost) = failed.next() => {
                    if let Some(url) = json_requests.remove(&lost.request_id) {
                        debug!("Load of {} failed: {}", url, lost.error_text);
                    }
                }
                else => break,
            }
        }
    }))
}

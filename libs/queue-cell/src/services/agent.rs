//! Client for hosted Azure AI agents.
//!
//! A call creates a thread and run in one request, polls the run until it
//! reaches a terminal state and then reads the newest assistant message,
//! which is expected to hold JSON (optionally inside a Markdown fence).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent service is not configured")]
    NotConfigured,

    #[error("Agent run did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Agent request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Agent run ended with status {status}: {message}")]
    RunFailed { status: String, message: String },

    #[error("Agent API error: {0}")]
    Api(String),

    #[error("Agent returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Timeout(_) => AppError::GatewayTimeout(err.to_string()),
            AgentError::NotConfigured => AppError::Internal(err.to_string()),
            _ => AppError::ExternalService(err.to_string()),
        }
    }
}

/// One part of the user message sent to an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentInput {
    Text(String),
    /// `data:<mime>;base64,<payload>` URL.
    ImageDataUrl(String),
}

impl AgentInput {
    fn to_content(&self) -> Value {
        match self {
            AgentInput::Text(text) => json!({ "type": "text", "text": text }),
            AgentInput::ImageDataUrl(url) => json!({ "type": "image_url", "image_url": { "url": url } }),
        }
    }
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Runs `agent_id` over `inputs` and returns the parsed JSON reply.
    async fn run_agent(&self, agent_id: &str, inputs: &[AgentInput]) -> Result<Value, AgentError>;
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: String,
    thread_id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

fn is_terminal(status: &str) -> bool {
    matches!(
        status,
        "completed" | "failed" | "cancelled" | "expired" | "incomplete" | "requires_action"
    )
}

/// Removes a surrounding Markdown code fence such as ```` ```json ... ``` ````.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_agent_json(text: &str) -> Result<Value, AgentError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AgentError::InvalidResponse(format!("reply is not JSON: {}", e)))
}

pub struct AzureAgentClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl AzureAgentClient {
    pub fn new(config: &AppConfig) -> Result<Self, AgentError> {
        if !config.is_ai_configured() {
            return Err(AgentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            endpoint: config.azure_ai_endpoint.trim_end_matches('/').to_string(),
            api_key: config.azure_ai_api_key.clone(),
            api_version: config.azure_ai_api_version.clone(),
            timeout: Duration::from_secs(config.azure_ai_timeout_seconds),
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, self.api_version)
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, AgentError> {
        let response = request
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Agent API request failed: {} - {}", status, body);
            return Err(AgentError::Api(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    async fn create_run(&self, agent_id: &str, inputs: &[AgentInput]) -> Result<RunResponse, AgentError> {
        let content: Vec<Value> = inputs.iter().map(AgentInput::to_content).collect();
        let body = json!({
            "assistant_id": agent_id,
            "thread": {
                "messages": [{ "role": "user", "content": content }]
            }
        });

        let value = self
            .send_json(self.client.post(self.url("/threads/runs")).json(&body))
            .await?;
        serde_json::from_value(value).map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunResponse, AgentError> {
        let url = self.url(&format!("/threads/{}/runs/{}", thread_id, run_id));
        let value = self.send_json(self.client.get(url)).await?;
        serde_json::from_value(value).map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, AgentError> {
        let url = format!(
            "{}&order=desc&limit=1",
            self.url(&format!("/threads/{}/messages", thread_id))
        );
        let value = self.send_json(self.client.get(url)).await?;
        let messages: MessageList =
            serde_json::from_value(value).map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        messages
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| {
                m.content
                    .into_iter()
                    .filter(|c| c.kind == "text")
                    .find_map(|c| c.text.map(|t| t.value))
            })
            .ok_or_else(|| AgentError::InvalidResponse("no assistant text in thread".to_string()))
    }

    async fn run_to_completion(&self, agent_id: &str, inputs: &[AgentInput]) -> Result<Value, AgentError> {
        let mut run = self.create_run(agent_id, inputs).await?;
        debug!("Started agent run {} on thread {}", run.id, run.thread_id);

        while !is_terminal(&run.status) {
            tokio::time::sleep(self.poll_interval).await;
            run = self.get_run(&run.thread_id, &run.id).await?;
            debug!("Agent run {} status: {}", run.id, run.status);
        }

        if run.status != "completed" {
            let message = run
                .last_error
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.code.unwrap_or_default(),
                        e.message.unwrap_or_default()
                    )
                })
                .unwrap_or_default();
            warn!("Agent run {} ended with {}", run.id, run.status);
            return Err(AgentError::RunFailed {
                status: run.status,
                message,
            });
        }

        let reply = self.latest_reply(&run.thread_id).await?;
        info!("Agent run {} completed", run.id);
        parse_agent_json(&reply)
    }
}

#[async_trait]
impl AgentRunner for AzureAgentClient {
    async fn run_agent(&self, agent_id: &str, inputs: &[AgentInput]) -> Result<Value, AgentError> {
        if agent_id.is_empty() {
            return Err(AgentError::NotConfigured);
        }

        match tokio::time::timeout(self.timeout, self.run_to_completion(agent_id, inputs)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_json() {
        let value = parse_agent_json("```json\n{\"patient\": {\"name\": \"Ada\"}}\n```").unwrap();
        assert_eq!(value["patient"]["name"], "Ada");
        assert!(parse_agent_json("not json").is_err());
    }

    #[test]
    fn error_mapping() {
        let timeout: AppError = AgentError::Timeout(5).into();
        assert_eq!(timeout.status_code(), 504);
        let failed: AppError = AgentError::Api("boom".into()).into();
        assert_eq!(failed.status_code(), 502);
    }
}

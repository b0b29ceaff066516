//! Agent platform client: threads, messages and runs
//!
//! Provides the `AgentPlatform` trait over the hosted agent service and an
//! `AzureAgentsClient` implementation that talks to the Azure AI Foundry
//! Agents REST API (`/threads`, `/threads/{id}/messages`, `/threads/{id}/runs`).
//!
//! Only the primitive calls live here. Waiting for runs to finish is the
//! server's job, so that it can be bounded and tested against a fake platform.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AgentsConfig;
use crate::models::Role;

// ============================================================================
// AgentPlatform trait
// ============================================================================

#[async_trait]
pub trait AgentPlatform: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, AgentError>;

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError>;

    /// All messages of a thread, oldest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError>;

    /// Runs of a thread, newest first.
    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>, AgentError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError>;

    /// Starts a run of `agent_id` over the thread. Returns immediately, usually `queued`.
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError>;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing agent platform endpoint or credentials")]
    MissingCredentials,

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}

// ============================================================================
// Platform types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub created_at: i64,
}

impl ThreadMessage {
    /// Value of the last text part, if the message has one.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().rev().find_map(|c| match c {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextContent {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Unknown(String),
}

impl RunStatus {
    /// The platform is still working on the run.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Queued => "queued".to_string(),
            RunStatus::InProgress => "in_progress".to_string(),
            RunStatus::RequiresAction => "requires_action".to_string(),
            RunStatus::Cancelling => "cancelling".to_string(),
            RunStatus::Cancelled => "cancelled".to_string(),
            RunStatus::Failed => "failed".to_string(),
            RunStatus::Completed => "completed".to_string(),
            RunStatus::Expired => "expired".to_string(),
            RunStatus::Unknown(s) => s,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

const PAGE_SIZE: &str = "100";

// ============================================================================
// AzureAgentsClient
// ============================================================================

/// REST client for the Azure AI Foundry Agents API.
#[derive(Debug, Clone)]
pub struct AzureAgentsClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AzureAgentsClient {
    pub fn new(config: &AgentsConfig) -> Result<Self, AgentError> {
        Self::with_base_url(config, config.endpoint.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &AgentsConfig, base_url: String) -> Result<Self, AgentError> {
        if base_url.is_empty() || config.api_key.is_empty() {
            return Err(AgentError::MissingCredentials);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .query(&[("api-version", self.api_version.as_str())])
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AgentError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(body);

            tracing::error!(code = status.as_u16(), message = %message, "Agent platform API error");

            return Err(AgentError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Follows `has_more`/`last_id` cursors until the list is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        order: &str,
    ) -> Result<Vec<T>, AgentError>
    where
        T: HasId,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut req = self
                .get(path)
                .query(&[("order", order), ("limit", PAGE_SIZE)]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }

            let page: ListResponse<T> = self.send(req).await?;
            let cursor = page
                .last_id
                .or_else(|| page.data.last().map(|item| item.id().to_string()));
            let has_more = page.has_more && !page.data.is_empty();
            items.extend(page.data);

            match cursor {
                Some(c) if has_more => after = Some(c),
                _ => break,
            }
        }

        Ok(items)
    }
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for ThreadMessage {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for Run {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl AgentPlatform for AzureAgentsClient {
    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let thread: Thread = self
            .send(self.post("/threads").json(&serde_json::json!({})))
            .await?;
        tracing::debug!(thread_id = %thread.id, "Created agent thread");
        Ok(thread)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        self.send(
            self.post(&format!("/threads/{}/messages", thread_id))
                .json(&CreateMessageRequest { role, content }),
        )
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        self.list_all(&format!("/threads/{}/messages", thread_id), "asc")
            .await
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>, AgentError> {
        self.list_all(&format!("/threads/{}/runs", thread_id), "desc")
            .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        self.send(self.get(&format!("/threads/{}/runs/{}", thread_id, run_id)))
            .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError> {
        let run: Run = self
            .send(
                self.post(&format!("/threads/{}/runs", thread_id))
                    .json(&CreateRunRequest {
                        assistant_id: agent_id,
                    }),
            )
            .await?;
        if run.id.is_empty() {
            return Err(AgentError::MissingField("id"));
        }
        tracing::debug!(thread_id = %thread_id, run_id = %run.id, "Created agent run");
        Ok(run)
    }
}

// ============================================================================
// TESTS
// ============================================================================

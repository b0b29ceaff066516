//! Conversation summarizer
//!
//! Archives a finished conversation: the stored turns are rendered as a
//! `role: message` transcript, posted to a dedicated summary thread and run
//! through the summary agent. The structured summary it answers with is
//! written to the summary table.
//!
//! All summaries share one summary thread, so they are serialized; the
//! platform rejects new messages on a thread while a run is active.

use std::sync::Arc;

use chatrelay_core::models::render_transcript;
use chatrelay_core::text::{extract_json, remove_source};
use chatrelay_core::{AgentPlatform, ChatStore, RelayError, Role, RunStatus};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::runner::{run_agent, RunWaitPolicy};

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// No stored turns for the thread; nothing to archive.
    Empty,
    /// Structured summary written to the summary table.
    Stored,
    /// Summary agent answered in plain text; stored as a message-shaped row.
    Unstructured,
    /// Summary agent produced no reply.
    NoReply,
    RunFailed(String),
}

pub struct Summarizer {
    platform: Arc<dyn AgentPlatform>,
    store: Arc<dyn ChatStore>,
    data_agent_id: String,
    summary_agent_id: String,
    summary_thread_id: String,
    policy: RunWaitPolicy,
    lock: Mutex<()>,
}

impl Summarizer {
    pub fn new(
        platform: Arc<dyn AgentPlatform>,
        store: Arc<dyn ChatStore>,
        data_agent_id: String,
        summary_agent_id: String,
        summary_thread_id: String,
        policy: RunWaitPolicy,
    ) -> Self {
        Self {
            platform,
            store,
            data_agent_id,
            summary_agent_id,
            summary_thread_id,
            policy,
            lock: Mutex::new(()),
        }
    }

    /// Create the shared summary thread on the platform, then the summarizer.
    pub async fn create(
        platform: Arc<dyn AgentPlatform>,
        store: Arc<dyn ChatStore>,
        data_agent_id: String,
        summary_agent_id: String,
        policy: RunWaitPolicy,
    ) -> Result<Self, RelayError> {
        let thread = platform.create_thread().await?;
        tracing::info!(thread_id = %thread.id, "Summary thread created");
        Ok(Self::new(
            platform,
            store,
            data_agent_id,
            summary_agent_id,
            thread.id,
            policy,
        ))
    }

    pub fn summary_thread_id(&self) -> &str {
        &self.summary_thread_id
    }

    pub async fn summarize(&self, thread_id: &str) -> Result<SummaryOutcome, RelayError> {
        let lines = self.store.conversation(thread_id, &self.data_agent_id).await?;
        let transcript = render_transcript(&lines);

        if transcript.is_empty() {
            tracing::debug!(thread_id = %thread_id, "Nothing to summarize");
            return Ok(SummaryOutcome::Empty);
        }

        let _guard = self.lock.lock().await;

        self.platform
            .post_message(&self.summary_thread_id, Role::User, &transcript)
            .await?;

        let run = run_agent(
            self.platform.as_ref(),
            &self.summary_thread_id,
            &self.summary_agent_id,
            &self.policy,
        )
        .await?;

        if run.status != RunStatus::Completed {
            let reason = run
                .last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| String::from(run.status));
            return Ok(SummaryOutcome::RunFailed(reason));
        }

        let messages = self.platform.list_messages(&self.summary_thread_id).await?;
        let Some(text) = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.text())
        else {
            return Ok(SummaryOutcome::NoReply);
        };
        let text = remove_source(text);

        match extract_json(&text) {
            Ok(summary) => {
                self.store.insert_summary(&summary).await?;
                Ok(SummaryOutcome::Stored)
            }
            Err(_) => {
                self.store
                    .insert_summary(&json!({
                        "role": "assistant",
                        "thread_id": thread_id,
                        "message": text,
                        "agent_id": self.summary_agent_id,
                    }))
                    .await?;
                Ok(SummaryOutcome::Unstructured)
            }
        }
    }

    /// Summarize in the background. Failures are logged, never returned.
    pub fn spawn(self: &Arc<Self>, thread_id: String) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.summarize(&thread_id).await {
                Ok(SummaryOutcome::RunFailed(reason)) => {
                    tracing::warn!(thread_id = %thread_id, reason = %reason, "Summary run failed")
                }
                Ok(outcome) => {
                    tracing::info!(thread_id = %thread_id, outcome = ?outcome, "Conversation archived")
                }
                Err(e) => {
                    tracing::warn!(thread_id = %thread_id, error = %e, "Summarization failed")
                }
            }
        })
    }
}

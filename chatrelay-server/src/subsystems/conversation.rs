//! Conversation flows behind the HTTP routes: start, chat, end.

use std::sync::Arc;

use chatrelay_core::text::{extract_json, remove_source, DateContext};
use chatrelay_core::{
    AgentPlatform, AppointmentBooker, AssistantReply, ChatRow, ChatStore, RelayError, Role, Run,
    RunStatus,
};
use chrono_tz::Tz;
use serde::Serialize;

use super::runner::{run_agent, RunWaitPolicy};
use super::summarize::Summarizer;
use super::tracker::ActiveThreads;

/// Reply text used when the agent finished without saying anything.
pub const NO_RESPONSE: &str = "No response";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StartResponse {
    /// Conversation opened without a user message.
    Thread { thread_id: String },
    Reply(AssistantReply),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndResponse {
    pub status: String,
    pub thread_id: String,
}

pub struct Conversations {
    platform: Arc<dyn AgentPlatform>,
    store: Arc<dyn ChatStore>,
    booker: Arc<dyn AppointmentBooker>,
    summarizer: Arc<Summarizer>,
    active: ActiveThreads,
    data_agent_id: String,
    policy: RunWaitPolicy,
    timezone: Tz,
}

impl Conversations {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn AgentPlatform>,
        store: Arc<dyn ChatStore>,
        booker: Arc<dyn AppointmentBooker>,
        summarizer: Arc<Summarizer>,
        active: ActiveThreads,
        data_agent_id: String,
        policy: RunWaitPolicy,
        timezone: Tz,
    ) -> Self {
        Self {
            platform,
            store,
            booker,
            summarizer,
            active,
            data_agent_id,
            policy,
            timezone,
        }
    }

    /// Open a conversation. The agent is told today's date first; without a
    /// user message it is run once so it can greet, and only the thread id is
    /// returned.
    pub async fn start(&self, message: Option<String>) -> Result<StartResponse, RelayError> {
        let thread = self.platform.create_thread().await?;
        let thread_id = thread.id;

        let today = DateContext::today(self.timezone);
        self.platform
            .post_message(&thread_id, Role::User, &today.message())
            .await?;

        let Some(message) = message else {
            self.run(&thread_id).await?;
            tracing::info!(thread_id = %thread_id, "Conversation opened");
            return Ok(StartResponse::Thread { thread_id });
        };

        self.store
            .insert_turn(&ChatRow::user(&thread_id, &message, &self.data_agent_id))
            .await?;
        self.active.touch(&thread_id).await;

        self.platform
            .post_message(&thread_id, Role::User, &message)
            .await?;

        let run = self.run(&thread_id).await?;
        if let Some(failed) = failure_reply(&run) {
            return Ok(StartResponse::Reply(failed));
        }

        let reply = self.record_reply(&thread_id).await?;
        tracing::info!(thread_id = %thread_id, "Conversation started with first message");
        Ok(StartResponse::Reply(reply))
    }

    /// One user turn: run the agent, store both sides, offer the reply to the booker.
    pub async fn chat(&self, thread_id: &str, message: &str) -> Result<AssistantReply, RelayError> {
        self.active.touch(thread_id).await;

        self.platform
            .post_message(thread_id, Role::User, message)
            .await?;
        self.store
            .insert_turn(&ChatRow::user(thread_id, message, &self.data_agent_id))
            .await?;

        let run = self.run(thread_id).await?;
        if let Some(failed) = failure_reply(&run) {
            return Ok(failed);
        }

        let reply = self.record_reply(thread_id).await?;
        let booked = self.booker.try_book(&reply).await?;

        if booked.message != reply.message {
            tracing::info!(thread_id = %thread_id, booker = self.booker.name(), "Booker replaced reply");
            self.store_reply(thread_id, &booked).await?;
        }

        Ok(booked)
    }

    /// Stop tracking the thread and archive it in the background.
    pub async fn end(&self, thread_id: &str) -> EndResponse {
        let was_active = self.active.remove(thread_id).await;
        tracing::info!(thread_id = %thread_id, was_active, "Conversation ended");

        self.summarizer.spawn(thread_id.to_string());

        EndResponse {
            status: "ok".to_string(),
            thread_id: thread_id.to_string(),
        }
    }

    /// Read the newest assistant message and store it when it is plain text.
    ///
    /// Structured replies (appointment data) are returned to the caller but
    /// not stored; the booker decides what the user sees.
    pub async fn record_reply(&self, thread_id: &str) -> Result<AssistantReply, RelayError> {
        let messages = self.platform.list_messages(thread_id).await?;

        let latest = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.text());

        let Some(text) = latest else {
            return Ok(AssistantReply::new(NO_RESPONSE, thread_id, &self.data_agent_id));
        };
        let text = remove_source(text);

        match extract_json(&text) {
            Ok(data) => {
                tracing::debug!(thread_id = %thread_id, "Assistant returned structured data");
                Ok(AssistantReply::new(data, thread_id, &self.data_agent_id))
            }
            Err(_) => {
                self.store
                    .insert_turn(&ChatRow::assistant(thread_id, &text, &self.data_agent_id))
                    .await?;
                Ok(AssistantReply::new(text, thread_id, &self.data_agent_id))
            }
        }
    }

    /// Persist an automatic assistant message, e.g. a booking confirmation.
    pub async fn store_reply(&self, thread_id: &str, reply: &AssistantReply) -> Result<(), RelayError> {
        self.store
            .insert_turn(&ChatRow::assistant(
                thread_id,
                &reply.message_text(),
                &self.data_agent_id,
            ))
            .await
    }

    async fn run(&self, thread_id: &str) -> Result<Run, RelayError> {
        run_agent(
            self.platform.as_ref(),
            thread_id,
            &self.data_agent_id,
            &self.policy,
        )
        .await
    }
}

/// The payload returned instead of a reply when the run did not complete.
fn failure_reply(run: &Run) -> Option<AssistantReply> {
    match &run.status {
        RunStatus::Completed => None,
        RunStatus::Failed => Some(AssistantReply::run_failed(
            run.last_error.as_ref().map(|e| e.to_string()).as_deref(),
        )),
        other => {
            tracing::warn!(run_id = %run.id, status = ?other, "Run ended without completing");
            Some(AssistantReply::run_failed(Some(&format!(
                "run ended with status {}",
                String::from(other.clone())
            ))))
        }
    }
}

//! In-memory fakes of the agent platform, chat store and booker.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::agents::{AgentError, MessageContent, RunError, TextContent};
use chatrelay_core::{
    AgentPlatform, AppointmentBooker, AssistantReply, ChatRow, ChatStore, ConversationLine,
    NoopBooker, RelayError, Role, Run, RunStatus, Thread, ThreadMessage,
};
use chatrelay_server::subsystems::conversation::Conversations;
use chatrelay_server::subsystems::runner::RunWaitPolicy;
use chatrelay_server::subsystems::summarize::Summarizer;
use chatrelay_server::subsystems::tracker::ActiveThreads;
use serde_json::Value;

pub const DATA_AGENT: &str = "asst_data";
pub const SUMMARY_AGENT: &str = "asst_summary";
pub const DEFAULT_REPLY: &str = "Hallo! Hoe kan ik u helpen?";

// ============================================================================
// FakePlatform
// ============================================================================

/// Agent platform that answers every run with a scripted reply.
///
/// `create_run` returns a queued run; the first `get_run` completes it and
/// appends the assistant message.
#[derive(Default)]
pub struct FakePlatform {
    messages: Mutex<HashMap<String, Vec<ThreadMessage>>>,
    runs: Mutex<HashMap<String, Vec<Run>>>,
    replies: Mutex<HashMap<String, VecDeque<String>>>,
    fail_next: Mutex<Option<RunError>>,
    ids: AtomicUsize,
    pub threads_created: AtomicUsize,
    pub runs_created: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.ids.fetch_add(1, Ordering::SeqCst))
    }

    /// Queue the reply the given agent gives on its next run.
    pub fn reply_with(&self, agent_id: &str, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .entry(agent_id.to_string())
            .or_default()
            .push_back(text.to_string());
    }

    /// Make the next run end in `failed`.
    pub fn fail_next_run(&self, code: &str, message: &str) {
        *self.fail_next.lock().unwrap() = Some(RunError {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    pub fn messages(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.messages
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_thread(&self, thread_id: &str) -> bool {
        self.messages.lock().unwrap().contains_key(thread_id)
    }

    fn push_message(&self, thread_id: &str, role: Role, text: &str) -> ThreadMessage {
        let msg = ThreadMessage {
            id: self.next_id("msg"),
            thread_id: thread_id.to_string(),
            role,
            content: vec![MessageContent::Text {
                text: TextContent {
                    value: text.to_string(),
                },
            }],
            created_at: 0,
        };
        self.messages
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(msg.clone());
        msg
    }
}

#[async_trait]
impl AgentPlatform for FakePlatform {
    async fn create_thread(&self) -> Result<Thread, AgentError> {
        let id = self.next_id("thread");
        self.messages.lock().unwrap().insert(id.clone(), Vec::new());
        self.threads_created.fetch_add(1, Ordering::SeqCst);
        Ok(Thread { id })
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AgentError> {
        if !self.has_thread(thread_id) {
            return Err(AgentError::Api {
                code: 404,
                message: format!("No thread found with id '{}'", thread_id),
            });
        }
        Ok(self.push_message(thread_id, role, content))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AgentError> {
        Ok(self.messages(thread_id))
    }

    async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>, AgentError> {
        let mut runs = self
            .runs
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .unwrap_or_default();
        runs.reverse();
        Ok(runs)
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AgentError> {
        let (run, reply) = {
            let mut runs = self.runs.lock().unwrap();
            let run = runs
                .get_mut(thread_id)
                .and_then(|rs| rs.iter_mut().find(|r| r.id == run_id))
                .ok_or(AgentError::Api {
                    code: 404,
                    message: "run not found".to_string(),
                })?;

            if !run.status.is_pending() {
                return Ok(run.clone());
            }

            let reply = match self.fail_next.lock().unwrap().take() {
                Some(err) => {
                    run.status = RunStatus::Failed;
                    run.last_error = Some(err);
                    None
                }
                None => {
                    run.status = RunStatus::Completed;
                    let agent = run.id.split(':').nth(1).unwrap_or(DATA_AGENT).to_string();
                    Some(
                        self.replies
                            .lock()
                            .unwrap()
                            .get_mut(&agent)
                            .and_then(|q| q.pop_front())
                            .unwrap_or_else(|| DEFAULT_REPLY.to_string()),
                    )
                }
            };
            (run.clone(), reply)
        };

        if let Some(text) = reply {
            self.push_message(thread_id, Role::Assistant, &text);
        }
        Ok(run)
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, AgentError> {
        // the agent id rides along in the run id so get_run knows whose reply to use
        let run = Run {
            id: format!("{}:{}", self.next_id("run"), agent_id),
            thread_id: thread_id.to_string(),
            status: RunStatus::Queued,
            last_error: None,
        };
        self.runs
            .lock()
            .unwrap()
            .entry(thread_id.to_string())
            .or_default()
            .push(run.clone());
        self.runs_created.fetch_add(1, Ordering::SeqCst);
        Ok(run)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<ChatRow>>,
    pub summaries: Mutex<Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rows_for(&self, thread_id: &str) -> Vec<ChatRow> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.thread_id == thread_id)
            .cloned()
            .collect()
    }

    pub fn summaries(&self) -> Vec<Value> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_turn(&self, row: &ChatRow) -> Result<(), RelayError> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn conversation(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Vec<ConversationLine>, RelayError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.thread_id == thread_id && r.agent_id == agent_id)
            .map(|r| ConversationLine {
                role: r.role.as_str().to_string(),
                message: r.message.clone(),
            })
            .collect())
    }

    async fn insert_summary(&self, summary: &Value) -> Result<(), RelayError> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

// ============================================================================
// Booker that confirms structured replies
// ============================================================================

pub struct ConfirmingBooker;

pub const CONFIRMATION: &str = "Uw afspraak is bevestigd.";

#[async_trait]
impl AppointmentBooker for ConfirmingBooker {
    async fn try_book(&self, reply: &AssistantReply) -> Result<AssistantReply, RelayError> {
        if reply.message.is_object() {
            let mut booked = reply.clone();
            booked.message = Value::String(CONFIRMATION.to_string());
            Ok(booked)
        } else {
            Ok(reply.clone())
        }
    }

    fn name(&self) -> &str {
        "confirming"
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub store: Arc<MemoryStore>,
    pub active: ActiveThreads,
    pub summarizer: Arc<Summarizer>,
    pub conversations: Arc<Conversations>,
}

pub fn fast_policy() -> RunWaitPolicy {
    RunWaitPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        deadline: Duration::from_secs(5),
    }
}

pub async fn harness() -> Harness {
    harness_with_booker(Arc::new(NoopBooker)).await
}

pub async fn harness_with_booker(booker: Arc<dyn AppointmentBooker>) -> Harness {
    let platform = FakePlatform::new();
    let store = MemoryStore::new();
    let active = ActiveThreads::new();

    let summarizer = Arc::new(
        Summarizer::create(
            platform.clone(),
            store.clone(),
            DATA_AGENT.to_string(),
            SUMMARY_AGENT.to_string(),
            fast_policy(),
        )
        .await
        .expect("summary thread"),
    );

    let conversations = Arc::new(Conversations::new(
        platform.clone(),
        store.clone(),
        booker,
        summarizer.clone(),
        active.clone(),
        DATA_AGENT.to_string(),
        fast_policy(),
        chrono_tz::Europe::Brussels,
    ));

    Harness {
        platform,
        store,
        active,
        summarizer,
        conversations,
    }
}

/// Poll until `check` holds or a second has passed.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

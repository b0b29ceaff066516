use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One persisted conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRow {
    pub role: Role,
    pub thread_id: String,
    pub message: String,
    pub agent_id: String,
}

impl ChatRow {
    pub fn user(thread_id: &str, message: &str, agent_id: &str) -> Self {
        Self {
            role: Role::User,
            thread_id: thread_id.to_string(),
            message: message.to_string(),
            agent_id: agent_id.to_string(),
        }
    }

    pub fn assistant(thread_id: &str, message: &str, agent_id: &str) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(thread_id, message, agent_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationLine {
    pub role: String,
    pub message: String,
}

/// Renders rows as `role: message` lines, the transcript format the summary agent reads.
pub fn render_transcript(lines: &[ConversationLine]) -> String {
    lines
        .iter()
        .map(|l| format!("{}: {}\n", l.role, l.message))
        .collect()
}

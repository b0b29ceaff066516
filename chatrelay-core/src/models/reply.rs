use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the caller sees after an agent turn. `message` is plain text, or the
/// structured object the agent emitted (e.g. appointment details).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub role: String,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl AssistantReply {
    pub fn new(message: impl Into<Value>, thread_id: &str, agent_id: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            message: message.into(),
            thread_id: Some(thread_id.to_string()),
            agent_id: Some(agent_id.to_string()),
        }
    }

    /// Payload returned when the agent run ends in `failed`.
    pub fn run_failed(last_error: Option<&str>) -> Self {
        Self {
            role: "assistant".to_string(),
            message: Value::String(format!("Run failed: {}", last_error.unwrap_or("None"))),
            thread_id: None,
            agent_id: None,
        }
    }

    /// Text form of the message, used when persisting it as a chat row.
    pub fn message_text(&self) -> String {
        match &self.message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

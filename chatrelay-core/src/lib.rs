pub mod agents;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod text;

pub use agents::{AgentError, AgentPlatform, AzureAgentsClient, Run, RunStatus, Thread, ThreadMessage};
pub use booking::{create_booker, AppointmentBooker, NoopBooker, WebhookBooker};
pub use config::RelayConfig;
pub use error::RelayError;
pub use models::{AssistantReply, ChatRow, ConversationLine, Role};
pub use store::{ChatStore, PgChatStore};

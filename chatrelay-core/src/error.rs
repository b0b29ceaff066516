use std::time::Duration;

use thiserror::Error;

use crate::agents::AgentError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Agent platform error: {0}")]
    Agent(#[from] AgentError),

    #[error("Run {run_id} on thread {thread_id} still pending after {waited:?}")]
    RunWaitTimeout {
        thread_id: String,
        run_id: String,
        waited: Duration,
    },

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Booking error: {0}")]
    Booking(String),

    #[error("Other error: {0}")]
    Other(String),
}

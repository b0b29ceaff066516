//! Chat store: persisted turns and conversation summaries.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::db::is_sql_identifier;
use crate::error::RelayError;
use crate::models::{ChatRow, ConversationLine};

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_turn(&self, row: &ChatRow) -> Result<(), RelayError>;

    /// Turns of one conversation with one agent, in insertion order.
    async fn conversation(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Vec<ConversationLine>, RelayError>;

    /// Insert a summary object, one column per top-level key.
    async fn insert_summary(&self, summary: &Value) -> Result<(), RelayError>;
}

/// Postgres-backed store (a Supabase project works as-is).
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
    chat_table: String,
    summary_table: String,
}

impl PgChatStore {
    pub fn new(pool: PgPool, config: &DatabaseConfig) -> Result<Self, RelayError> {
        for table in [&config.chat_table, &config.summary_table] {
            if !is_sql_identifier(table) {
                return Err(RelayError::InvalidIdentifier(table.clone()));
            }
        }
        Ok(Self {
            pool,
            chat_table: config.chat_table.clone(),
            summary_table: config.summary_table.clone(),
        })
    }
}

/// Column list for a summary insert. Every key must be a plain identifier.
fn summary_columns(summary: &Value) -> Result<Vec<String>, RelayError> {
    let obj = summary
        .as_object()
        .ok_or_else(|| RelayError::Other("summary must be a JSON object".to_string()))?;
    if obj.is_empty() {
        return Err(RelayError::Other("summary object is empty".to_string()));
    }
    obj.keys()
        .map(|k| {
            if is_sql_identifier(k) {
                Ok(k.clone())
            } else {
                Err(RelayError::InvalidIdentifier(k.clone()))
            }
        })
        .collect()
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn insert_turn(&self, row: &ChatRow) -> Result<(), RelayError> {
        let query = format!(
            "INSERT INTO {} (role, thread_id, message, agent_id) VALUES ($1, $2, $3, $4)",
            self.chat_table
        );
        sqlx::query(&query)
            .bind(row.role.as_str())
            .bind(&row.thread_id)
            .bind(&row.message)
            .bind(&row.agent_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(thread_id = %row.thread_id, role = row.role.as_str(), "Stored chat turn");
        Ok(())
    }

    async fn conversation(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Vec<ConversationLine>, RelayError> {
        let query = format!(
            "SELECT role, message FROM {} WHERE thread_id = $1 AND agent_id = $2 ORDER BY created_at",
            self.chat_table
        );
        let rows = sqlx::query_as::<_, ConversationLine>(&query)
            .bind(thread_id)
            .bind(agent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_summary(&self, summary: &Value) -> Result<(), RelayError> {
        let columns = summary_columns(summary)?.join(", ");
        let query = format!(
            "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)",
            table = self.summary_table,
            columns = columns
        );
        sqlx::query(&query).bind(summary).execute(&self.pool).await?;

        tracing::info!(table = %self.summary_table, "Stored conversation summary");
        Ok(())
    }
}

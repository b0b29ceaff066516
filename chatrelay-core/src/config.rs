use config::{Config, Environment, File};
use serde::Deserialize;

use crate::db::is_sql_identifier;
use crate::error::RelayError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub run_wait: RunWaitConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub chat_table: String,
    pub summary_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            chat_table: "chatbot_data".to_string(),
            summary_table: "hands_summary_data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    /// Project endpoint, e.g. `https://<resource>.services.ai.azure.com/api/projects/<project>`
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub data_agent_id: String,
    pub summary_agent_id: String,
    pub request_timeout_seconds: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "v1".to_string(),
            data_agent_id: String::new(),
            summary_agent_id: String::new(),
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunWaitConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub deadline_seconds: u64,
}

impl Default for RunWaitConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            deadline_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    pub interval_seconds: u64,
    pub idle_timeout_seconds: u64,
    /// Entries inspected per sweep, oldest first. 0 inspects every entry.
    pub max_checks_per_sweep: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 600,
            idle_timeout_seconds: 600,
            max_checks_per_sweep: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BookingConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    pub timezone: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Brussels".to_string(),
        }
    }
}

impl RelayConfig {
    /// Load config from an optional TOML file, then `CHATRELAY__SECTION__KEY` env overrides.
    pub fn load(path: &str) -> Result<Self, RelayError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("CHATRELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("http.cors_origins")
                    .try_parsing(true),
            )
            .build()?;
        let config: RelayConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        for table in [&self.database.chat_table, &self.database.summary_table] {
            if !is_sql_identifier(table) {
                return Err(RelayError::InvalidIdentifier(table.clone()));
            }
        }
        if self.conversation.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(RelayError::Other(format!(
                "unknown timezone {:?}",
                self.conversation.timezone
            )));
        }
        Ok(())
    }

    pub fn timezone(&self) -> chrono_tz::Tz {
        self.conversation
            .timezone
            .parse()
            .unwrap_or(chrono_tz::Europe::Brussels)
    }
}

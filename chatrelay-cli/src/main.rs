//! chatrelay-cli: terminal client for a running chatrelay server
//!
//! # Subcommands
//! - `start [message] [--json]`           open a conversation
//! - `chat <thread_id> <message> [--json]` send one user turn
//! - `end <thread_id>`                    end and archive a conversation
//! - `status`                              show server health and version

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "chatrelay-cli", version, about = "Talk to a chatrelay server")]
struct Cli {
    /// chatrelay HTTP server URL (overrides CHATRELAY_URL env var)
    #[arg(long, env = "CHATRELAY_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response instead of the reply text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a conversation, optionally with a first message
    Start {
        /// First user message
        message: Option<String>,
    },

    /// Send a message on an existing conversation
    Chat {
        thread_id: String,
        message: String,
    },

    /// End a conversation and archive it
    End { thread_id: String },

    /// Show chatrelay server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Assistant reply from POST /start or POST /chat
#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub role: Option<String>,
    #[serde(default)]
    pub message: Value,
    pub thread_id: Option<String>,
}

/// Render a reply message for the terminal: strings as-is, structured
/// payloads pretty-printed.
pub fn reply_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Human-readable rendering of a /start or /chat response body.
pub fn render_response(body: &Value) -> String {
    let reply: ReplyBody = match serde_json::from_value(body.clone()) {
        Ok(r) => r,
        Err(_) => return body.to_string(),
    };

    let text = reply_text(&reply.message);
    match (reply.role, reply.thread_id) {
        // bare thread id from POST /start without a message
        (None, Some(thread_id)) if text.is_empty() => format!("thread: {}", thread_id),
        (_, Some(thread_id)) => format!("[{}] {}", thread_id, text),
        (_, None) => text,
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST a JSON body and return the JSON response, exiting on transport or
/// HTTP failures.
fn post(server: &str, path: &str, body: &Value) -> anyhow::Result<Value> {
    // agent runs can take minutes
    let client = client(330)?;
    let url = format!("{}{}", server, path);

    let resp = match client.post(&url).json(body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("chatrelay-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("chatrelay-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    match resp.json() {
        Ok(v) => Ok(v),
        Err(e) => {
            eprintln!("chatrelay-cli: failed to parse response: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_body(body: &Value, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(body)?);
    } else {
        println!("{}", render_response(body));
    }
    Ok(())
}

fn do_start(server: &str, message: Option<String>, json_output: bool) -> anyhow::Result<()> {
    let body = post(server, "/start", &serde_json::json!({ "message": message }))?;
    print_body(&body, json_output)
}

fn do_chat(server: &str, thread_id: &str, message: &str, json_output: bool) -> anyhow::Result<()> {
    let body = post(
        server,
        "/chat",
        &serde_json::json!({ "thread_id": thread_id, "message": message }),
    )?;
    print_body(&body, json_output)
}

fn do_end(server: &str, thread_id: &str, json_output: bool) -> anyhow::Result<()> {
    let body = post(
        server,
        "/end_conversation",
        &serde_json::json!({ "thread_id": thread_id }),
    )?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "Ended {} ({})",
            body["thread_id"].as_str().unwrap_or(thread_id),
            body["status"].as_str().unwrap_or("unknown")
        );
    }
    Ok(())
}

/// Show the server status by calling GET /health and GET /version.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: Value = r.json().unwrap_or_default();
            println!("chatrelay server: {}", body["status"].as_str().unwrap_or("unknown"));
        }
        Ok(r) => {
            eprintln!("chatrelay-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("chatrelay-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    let version: Value = client
        .get(format!("{}/version", server))
        .send()
        .and_then(|r| r.json())
        .unwrap_or_default();
    println!("Version:          {}", version["version"].as_str().unwrap_or("?"));

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Start { message } => do_start(&server, message, cli.json),
        Commands::Chat { thread_id, message } => do_chat(&server, &thread_id, &message, cli.json),
        Commands::End { thread_id } => do_end(&server, &thread_id, cli.json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("chatrelay-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

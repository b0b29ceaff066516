//! chatrelay HTTP API
//!
//! Axum server for the chat widget. Each endpoint has a thin axum handler
//! that delegates to an inner function returning `(StatusCode, Value)`, so
//! the flows can be tested without axum dispatch.
//!
//! Endpoints:
//! - GET  /health            liveness
//! - GET  /version           server version info
//! - GET|HEAD /, GET /chat   static banner
//! - POST /start             open a conversation, optionally with a first message
//! - POST /chat              one user turn
//! - POST /end_conversation  stop tracking and archive a conversation

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay_core::config::HttpConfig;
use chatrelay_core::RelayError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::subsystems::conversation::Conversations;

pub const BANNER: &str =
    "<h1>AI-D Chatbot API is running! </h1><p>Use POST /chat to talk to the bot.</p>";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub conversations: Arc<Conversations>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>, config: &HttpConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/", get(banner_handler))
        .route("/chat", get(banner_handler).post(chat_handler))
        .route("/start", post(start_handler))
        .route("/end_conversation", post(end_handler))
        .layer(build_cors_layer(config))
        .with_state(state)
}

fn build_cors_layer(config: &HttpConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(origins)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    config: HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);

    let app = build_router(state, &config);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("chatrelay HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct StartRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub thread_id: String,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn health_inner() -> serde_json::Value {
    serde_json::json!({ "status": "ok" })
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "chatrelay",
    })
}

pub async fn start_inner(
    conversations: &Conversations,
    req: StartRequest,
) -> (StatusCode, serde_json::Value) {
    match conversations.start(req.message).await {
        Ok(resp) => to_body(&resp),
        Err(e) => error_body("start", e),
    }
}

pub async fn chat_inner(
    conversations: &Conversations,
    req: ChatRequest,
) -> (StatusCode, serde_json::Value) {
    if req.thread_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            serde_json::json!(ErrorResponse::new("thread_id field is required")),
        );
    }

    match conversations.chat(&req.thread_id, &req.message).await {
        Ok(reply) => to_body(&reply),
        Err(e) => error_body("chat", e),
    }
}

pub async fn end_inner(
    conversations: &Conversations,
    req: EndRequest,
) -> (StatusCode, serde_json::Value) {
    let resp = conversations.end(&req.thread_id).await;
    to_body(&resp)
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn banner_handler() -> Html<&'static str> {
    Html(BANNER)
}

pub async fn start_handler(State(state): State<Arc<HttpState>>, body: Bytes) -> impl IntoResponse {
    let req = match parse_start_request(&body) {
        Ok(req) => req,
        Err(rejection) => {
            return (
                rejection.status(),
                Json(serde_json::json!(ErrorResponse::new(rejection.body_text()))),
            )
        }
    };
    let (status, body) = start_inner(&state.conversations, req).await;
    (status, Json(body))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.conversations, req).await;
    (status, Json(body))
}

pub async fn end_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<EndRequest>,
) -> impl IntoResponse {
    let (status, body) = end_inner(&state.conversations, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// An empty `/start` body means "no message"; anything else must be a valid
/// `StartRequest`.
pub fn parse_start_request(body: &[u8]) -> Result<StartRequest, JsonRejection> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartRequest::default());
    }
    Json::<StartRequest>::from_bytes(body).map(|Json(req)| req)
}

fn to_body<T: Serialize>(value: &T) -> (StatusCode, serde_json::Value) {
    match serde_json::to_value(value) {
        Ok(v) => (StatusCode::OK, v),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!(ErrorResponse::new(e.to_string())),
        ),
    }
}

fn error_body(route: &str, e: RelayError) -> (StatusCode, serde_json::Value) {
    tracing::error!(route, error = %e, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!(ErrorResponse::new(e.to_string())),
    )
}

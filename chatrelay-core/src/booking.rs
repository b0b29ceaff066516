//! Appointment-booking seam.
//!
//! After every chat turn the assistant reply is offered to a booker. When the
//! reply carries appointment details the booker makes the reservation and
//! answers with its own message (confirmation or failure); otherwise it hands
//! the reply back untouched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::BookingConfig;
use crate::error::RelayError;
use crate::models::AssistantReply;

#[async_trait]
pub trait AppointmentBooker: Send + Sync {
    async fn try_book(&self, reply: &AssistantReply) -> Result<AssistantReply, RelayError>;

    fn name(&self) -> &str;
}

/// Booker used when no booking service is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopBooker;

#[async_trait]
impl AppointmentBooker for NoopBooker {
    async fn try_book(&self, reply: &AssistantReply) -> Result<AssistantReply, RelayError> {
        Ok(reply.clone())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Forwards the reply to an HTTP booking service, which answers with the reply to show.
#[derive(Debug, Clone)]
pub struct WebhookBooker {
    client: Client,
    url: String,
}

impl WebhookBooker {
    pub fn new(url: String) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RelayError::Booking(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AppointmentBooker for WebhookBooker {
    async fn try_book(&self, reply: &AssistantReply) -> Result<AssistantReply, RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(reply)
            .send()
            .await
            .map_err(|e| RelayError::Booking(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), body = %body, "Booking webhook error");
            return Err(RelayError::Booking(format!("webhook returned {}", status)));
        }

        response
            .json::<AssistantReply>()
            .await
            .map_err(|e| RelayError::Booking(e.to_string()))
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

pub fn create_booker(config: &BookingConfig) -> Result<Arc<dyn AppointmentBooker>, RelayError> {
    match config.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(WebhookBooker::new(url.to_string())?)),
        _ => Ok(Arc::new(NoopBooker)),
    }
}

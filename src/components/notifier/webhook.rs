use super::Notifier;
use crate::components::trigger_scheduler::TriggerPayload;
use crate::error::{notification_error, BotResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Body of a chat webhook call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub username: String,
    pub content: String,
}

impl WebhookMessage {
    pub fn for_event(payload: &TriggerPayload) -> Self {
        Self {
            username: format!("Calendar bot {}", payload.calendar.name),
            content: format!("Event: {}", payload.summary),
        }
    }
}

/// Posts event notifications to each calendar's webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> BotResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| notification_error(&format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &TriggerPayload) -> BotResult<()> {
        let message = WebhookMessage::for_event(payload);

        let response = self
            .client
            .post(&payload.calendar.webhook)
            .json(&message)
            .send()
            .await
            .map_err(|e| notification_error(&format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(notification_error(&format!(
                "Webhook answered HTTP {} - {}",
                status, body
            )));
        }

        info!("Sent notification for {} ({})", payload.summary, payload.calendar.name);
        Ok(())
    }
}

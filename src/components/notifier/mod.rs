mod webhook;

pub use webhook::{WebhookMessage, WebhookNotifier};

use crate::components::trigger_scheduler::TriggerPayload;
use crate::error::BotResult;
use async_trait::async_trait;

/// Delivers the message for a fired trigger
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &TriggerPayload) -> BotResult<()>;
}

//! One-shot timers that notify when calendar events start.

mod models;
mod registry;

pub use models::{TriggerId, TriggerPayload};
pub use registry::TriggerScheduler;

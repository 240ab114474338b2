pub mod calendar_source;
pub mod notifier;
pub mod refresh;
pub mod trigger_scheduler;

pub use calendar_source::{Calendar, CalendarEventBatch, Event};
pub use notifier::Notifier;
pub use refresh::RefreshLoop;
pub use trigger_scheduler::TriggerScheduler;

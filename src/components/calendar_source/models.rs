use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A watched calendar and the webhook its notifications go to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    pub name: String,
    pub webhook: String,
}

impl Calendar {
    pub fn new(name: impl Into<String>, webhook: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook: webhook.into(),
        }
    }
}

/// An upcoming event read during one refresh cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub calendar: Arc<Calendar>,
}

/// All events read for one calendar in one refresh cycle
#[derive(Debug, Clone)]
pub struct CalendarEventBatch {
    pub calendar: Arc<Calendar>,
    pub events: Vec<Event>,
}

impl CalendarEventBatch {
    pub fn empty(calendar: Arc<Calendar>) -> Self {
        Self {
            calendar,
            events: Vec::new(),
        }
    }
}

/// One entry of a store directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub name: String,
    /// Last modification time, if the store reported one
    pub modified: Option<DateTime<Utc>>,
    pub is_collection: bool,
}

/// An event as returned by a calendar parser, before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub summary: String,
    pub start: Option<DateTime<Utc>>,
}

use crate::components::calendar_source::Calendar;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identity of an armed trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(Uuid);

impl TriggerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a trigger delivers when it fires, captured by value when armed
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerPayload {
    pub summary: String,
    pub calendar: Arc<Calendar>,
}

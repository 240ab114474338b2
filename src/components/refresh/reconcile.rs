use crate::components::calendar_source::CalendarEventBatch;
use crate::components::trigger_scheduler::TriggerPayload;
use chrono::{DateTime, Utc};

/// A trigger that should exist after this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrigger {
    pub fire_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

/// Compute the complete set of triggers for a cycle.
///
/// Every event becomes one trigger, in calendar order and then listing
/// order. Nothing is compared against earlier cycles and duplicates are kept.
pub fn reconcile(batches: &[CalendarEventBatch]) -> Vec<PlannedTrigger> {
    batches
        .iter()
        .flat_map(|batch| batch.events.iter())
        .map(|event| PlannedTrigger {
            fire_at: event.start_time,
            payload: TriggerPayload {
                summary: event.summary.clone(),
                calendar: event.calendar.clone(),
            },
        })
        .collect()
}

use super::ics::CalendarParser;
use super::models::{Calendar, CalendarEventBatch, Event, StoreEntry};
use super::store::CalendarStore;
use crate::error::BotResult;
use crate::utils::time::to_chrono;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Time bounds applied while reading calendars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Only events starting within this span from now are kept
    pub look_ahead: Duration,
    /// Files not modified within this span are skipped
    pub recency: Duration,
}

/// Read upcoming events for every calendar.
///
/// Fails only when the store cannot be reached. Listing, read and parse
/// failures are logged and skip the affected calendar or file. The result
/// holds exactly one batch per calendar, in input order.
pub async fn read_calendar_events(
    store: &dyn CalendarStore,
    parser: &dyn CalendarParser,
    calendars: &[Arc<Calendar>],
    window: FetchWindow,
    now: DateTime<Utc>,
) -> BotResult<Vec<CalendarEventBatch>> {
    store.connect().await?;

    let window_end = now
        .checked_add_signed(to_chrono(window.look_ahead))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let modified_after = now
        .checked_sub_signed(to_chrono(window.recency))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut batches = Vec::with_capacity(calendars.len());
    for calendar in calendars {
        let mut batch = CalendarEventBatch::empty(Arc::clone(calendar));
        let dir = format!("/{}", calendar.name);

        let entries = match store.list(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to list calendar {}: {}", calendar.name, e);
                batches.push(batch);
                continue;
            }
        };

        for entry in entries {
            if !is_recent(&entry, modified_after) {
                debug!("Skipping unmodified file {}/{}", dir, entry.name);
                continue;
            }

            let path = format!("{}/{}", dir, entry.name);
            let data = match store.read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to read {}: {}", path, e);
                    continue;
                }
            };

            let parsed = match parser.parse(&data, now, window_end) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Ignoring unparsable calendar file {}: {}", path, e);
                    continue;
                }
            };

            batch.events.extend(parsed.into_iter().filter_map(|event| {
                let start = event.start?;
                (start > now && start < window_end).then(|| Event {
                    summary: event.summary,
                    start_time: start,
                    calendar: Arc::clone(calendar),
                })
            }));
        }

        debug!(
            "Read {} upcoming events from calendar {}",
            batch.events.len(),
            calendar.name
        );
        batches.push(batch);
    }

    Ok(batches)
}

/// Whether a listed file should be read this cycle
fn is_recent(entry: &StoreEntry, modified_after: DateTime<Utc>) -> bool {
    if entry.is_collection {
        return false;
    }
    match entry.modified {
        Some(modified) => modified >= modified_after,
        None => true,
    }
}

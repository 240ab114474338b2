//! Reads upcoming events from calendar files kept in a remote store.

mod ics;
pub mod models;
mod reader;
mod recurrence;
mod store;

pub use ics::{CalendarParser, IcsParser};
pub use models::{Calendar, CalendarEventBatch, Event, ParsedEvent, StoreEntry};
pub use reader::{read_calendar_events, FetchWindow};
pub use store::{parse_multistatus, CalendarStore, WebDavStore};

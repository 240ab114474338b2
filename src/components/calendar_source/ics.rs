use super::models::ParsedEvent;
use super::recurrence::expand_occurrences;
use crate::error::{parse_error, BotResult};
use crate::utils::time::{date_to_utc, floating_to_utc, zoned_to_utc};
use chrono::{DateTime, Utc};
use icalendar::{
    CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, EventLike,
};
use tracing::debug;

/// Turns raw calendar file contents into events
pub trait CalendarParser: Send + Sync {
    /// Parse `data`, returning events that start inside `[window_start, window_end]`.
    /// Events without a determinable start are returned with `start: None`.
    fn parse(
        &self,
        data: &[u8],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> BotResult<Vec<ParsedEvent>>;
}

/// iCalendar (RFC 5545) parser.
///
/// An event with an `RRULE` yields one entry per occurrence inside the
/// window, minus its `EXDATE`s. A rule that cannot be expanded falls back
/// to the event's own start.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcsParser;

impl IcsParser {
    pub fn new() -> Self {
        Self
    }
}

impl CalendarParser for IcsParser {
    fn parse(
        &self,
        data: &[u8],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> BotResult<Vec<ParsedEvent>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| parse_error(&format!("Calendar data is not UTF-8: {}", e)))?;
        let calendar: icalendar::Calendar = text
            .parse()
            .map_err(|e| parse_error(&format!("Malformed calendar: {}", e)))?;

        let events = calendar
            .components
            .iter()
            .filter_map(|component| match component {
                CalendarComponent::Event(event) => Some(event),
                _ => None,
            })
            .flat_map(|event| occurrences(event, window_start, window_end))
            .collect();

        Ok(events)
    }
}

fn occurrences(
    event: &Event,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<ParsedEvent> {
    let summary = event.get_summary().unwrap_or_default().to_string();
    let Some(start) = event.get_start() else {
        return vec![ParsedEvent { summary, start: None }];
    };

    match expand_occurrences(event, start.clone(), window_start, window_end) {
        Ok(Some(starts)) => {
            return starts
                .into_iter()
                .map(|start| ParsedEvent {
                    summary: summary.clone(),
                    start: Some(start),
                })
                .collect();
        }
        Ok(None) => {}
        Err(e) => debug!("Using first occurrence of {}: {}", summary, e),
    }

    match start_to_utc(start) {
        Some(start) if start < window_start || start > window_end => Vec::new(),
        start => vec![ParsedEvent { summary, start }],
    }
}

fn start_to_utc(start: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match start {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => floating_to_utc(&dt),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            zoned_to_utc(&date_time, &tzid)
        }
        DatePerhapsTime::Date(date) => date_to_utc(&date),
    }
}

use crate::error::{parse_error, BotResult};
use crate::utils::time::{date_to_utc, floating_to_utc, zoned_to_utc};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use icalendar::{CalendarDateTime, Component, DatePerhapsTime, Event};
use rrule::RRuleSet;

/// Upper bound on occurrences produced for a single event per read
const MAX_OCCURRENCES: u16 = 512;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Occurrences of a recurring event inside `[window_start, window_end]`.
///
/// Returns `Ok(None)` when the event has no `RRULE`. `EXDATE` values are
/// honoured. A floating or all-day `DTSTART` is pinned to its UTC instant
/// before expansion.
pub fn expand_occurrences(
    event: &Event,
    start: DatePerhapsTime,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> BotResult<Option<Vec<DateTime<Utc>>>> {
    let Some(rule) = event.property_value("RRULE") else {
        return Ok(None);
    };

    let mut text = dtstart_line(start)
        .ok_or_else(|| parse_error("Recurring event has an unresolvable start"))?;
    text.push_str("\nRRULE:");
    text.push_str(rule.trim());
    for exdate in exdates(event) {
        text.push_str("\nEXDATE:");
        text.push_str(&exdate.format(UTC_FORMAT).to_string());
    }

    let set: RRuleSet = text
        .parse()
        .map_err(|e| parse_error(&format!("Invalid recurrence rule {}: {}", rule, e)))?;

    // Widened by a second so the inclusive bounds below decide the edges
    let after = window_start
        .checked_sub_signed(Duration::seconds(1))
        .unwrap_or(window_start);
    let before = window_end
        .checked_add_signed(Duration::seconds(1))
        .unwrap_or(window_end);

    let occurrences = set
        .after(after.with_timezone(&rrule::Tz::UTC))
        .before(before.with_timezone(&rrule::Tz::UTC))
        .all(MAX_OCCURRENCES)
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| *dt >= window_start && *dt <= window_end)
        .collect();

    Ok(Some(occurrences))
}

fn dtstart_line(start: DatePerhapsTime) -> Option<String> {
    let utc = match start {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => dt,
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            if tzid.parse::<chrono_tz::Tz>().is_ok() {
                return Some(format!(
                    "DTSTART;TZID={}:{}",
                    tzid,
                    date_time.format(LOCAL_FORMAT)
                ));
            }
            zoned_to_utc(&date_time, &tzid)?
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => floating_to_utc(&dt)?,
        DatePerhapsTime::Date(date) => date_to_utc(&date)?,
    };
    Some(format!("DTSTART:{}", utc.format(UTC_FORMAT)))
}

/// Excluded instants, resolved to UTC. All-day exclusions are ignored.
fn exdates(event: &Event) -> Vec<DateTime<Utc>> {
    let Some(properties) = event.multi_properties().get("EXDATE") else {
        return Vec::new();
    };

    properties
        .iter()
        .flat_map(|property| {
            let tzid = property.params().get("TZID").map(|p| p.value().to_string());
            property
                .value()
                .split(',')
                .filter_map(move |value| exdate_to_utc(value.trim(), tzid.as_deref()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn exdate_to_utc(value: &str, tzid: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(stripped) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, LOCAL_FORMAT).ok()?;
        return Some(naive.and_utc());
    }
    let naive = NaiveDateTime::parse_from_str(value, LOCAL_FORMAT).ok()?;
    match tzid {
        Some(tzid) => zoned_to_utc(&naive, tzid),
        None => floating_to_utc(&naive),
    }
}

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Resolve a local datetime, taking the earlier instant on DST overlaps
fn resolve<T: TimeZone>(result: LocalResult<DateTime<T>>) -> Option<DateTime<Utc>> {
    match result {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Interpret a floating datetime in the host's local timezone
pub fn floating_to_utc(dt: &NaiveDateTime) -> Option<DateTime<Utc>> {
    resolve(Local.from_local_datetime(dt))
}

/// Interpret a datetime in a named IANA timezone, falling back to local time
pub fn zoned_to_utc(dt: &NaiveDateTime, tzid: &str) -> Option<DateTime<Utc>> {
    match tzid.parse::<Tz>() {
        Ok(tz) => resolve(tz.from_local_datetime(dt)),
        Err(_) => floating_to_utc(dt),
    }
}

/// Local midnight of an all-day date
pub fn date_to_utc(date: &NaiveDate) -> Option<DateTime<Utc>> {
    floating_to_utc(&date.and_hms_opt(0, 0, 0)?)
}

/// Time left until `target`, zero when it has already passed
pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Convert a std duration into a chrono one, saturating on overflow
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_is_zero_for_past_targets() {
        let now = Utc::now();
        assert_eq!(until(now - chrono::Duration::minutes(5), now), Duration::ZERO);
        assert_eq!(
            until(now + chrono::Duration::seconds(90), now),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn zoned_time_uses_named_zone() {
        let dt = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let utc = zoned_to_utc(&dt, "Europe/Helsinki").unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2026, 1, 15, 7, 0, 0).unwrap());
    }

    #[test]
    fn unknown_zone_falls_back_to_local() {
        let dt = NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        assert_eq!(zoned_to_utc(&dt, "Mars/Olympus"), floating_to_utc(&dt));
    }
}

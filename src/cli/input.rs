//! Parsing of user-typed times, dates and watch lines.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::clock::{GeofenceTransition, ManualClockAction};
use crate::report::Calendar;

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// RFC3339, or a wall-clock `YYYY-MM-DD HH:MM[:SS]` read in `calendar`.
pub fn parse_timestamp(value: &str, calendar: &Calendar) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| calendar.from_local(naive))
        .ok_or_else(|| anyhow!("invalid time '{value}' (use RFC3339 or YYYY-MM-DD HH:MM)"))
}

pub fn parse_optional_timestamp(
    value: Option<&str>,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    value.map_or(Ok(now), |value| parse_timestamp(value, calendar))
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}' (expected YYYY-MM-DD)"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchInput {
    Geofence(GeofenceTransition),
    Manual(ManualClockAction),
}

/// Parses `enter|exit|in|out [time]`. Blank lines and `#` comments yield `None`.
pub fn parse_watch_line(
    line: &str,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Result<Option<WatchInput>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (keyword, rest) = match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, Some(rest.trim())),
        None => (line, None),
    };
    let at = parse_optional_timestamp(rest.filter(|r| !r.is_empty()), calendar, now)?;

    let input = match keyword.to_ascii_lowercase().as_str() {
        "enter" => WatchInput::Geofence(GeofenceTransition::enter(at)),
        "exit" => WatchInput::Geofence(GeofenceTransition::exit(at)),
        "in" => WatchInput::Manual(ManualClockAction::clock_in(at)),
        "out" => WatchInput::Manual(ManualClockAction::clock_out(at)),
        other => bail!("unknown watch command '{other}' (expected enter, exit, in or out)"),
    };
    Ok(Some(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn local_times_use_the_calendar_offset() {
        let calendar: Calendar = "+02:00".parse().unwrap();
        let parsed = parse_timestamp("2024-03-04 09:30", &calendar).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 4, 7, 30, 0).unwrap());
    }

    #[test]
    fn rfc3339_ignores_the_calendar() {
        let calendar: Calendar = "+02:00".parse().unwrap();
        let parsed = parse_timestamp("2024-03-04T09:30:00Z", &calendar).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday", &Calendar::utc()).is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn watch_lines() {
        let calendar = Calendar::utc();

        assert_eq!(
            parse_watch_line("enter", &calendar, now()).unwrap(),
            Some(WatchInput::Geofence(GeofenceTransition::enter(now())))
        );
        assert_eq!(
            parse_watch_line("  OUT 2024-03-04 17:00 ", &calendar, now()).unwrap(),
            Some(WatchInput::Manual(ManualClockAction::clock_out(
                Utc.with_ymd_and_hms(2024, 3, 4, 17, 0, 0).unwrap()
            )))
        );
        assert_eq!(parse_watch_line("# note", &calendar, now()).unwrap(), None);
        assert_eq!(parse_watch_line("", &calendar, now()).unwrap(), None);
        assert!(parse_watch_line("leave", &calendar, now()).is_err());
    }
}

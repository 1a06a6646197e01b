use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::models::GapStatus;

/// Fixed-width UTC timestamps so SQL range comparisons on TEXT stay chronological.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_optional_datetime(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(format_datetime)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_gap_status(value: i64) -> Result<GapStatus> {
    match value {
        0 => Ok(GapStatus::Active),
        1 => Ok(GapStatus::Deleted),
        other => Err(anyhow!("unknown gap deleted flag {other}")),
    }
}

pub fn gap_status_flag(status: GapStatus) -> i64 {
    match status {
        GapStatus::Active => 0,
        GapStatus::Deleted => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(format_datetime(&early) < format_datetime(&late));
        assert_eq!(format_datetime(&early), "2024-01-01T09:00:00.000Z");
    }

    #[test]
    fn parses_what_it_formats() {
        let value = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
        let parsed = parse_datetime(&format_datetime(&value), "value").unwrap();
        assert_eq!(parsed, value);
        assert!(parse_gap_status(2).is_err());
    }
}

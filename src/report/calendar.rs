//! Day and week boundaries in the user's configured time zone.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime,
    Offset, TimeZone, Utc,
};

/// Time zone used to cut instants into calendar days and Monday-keyed weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl Calendar {
    pub fn utc() -> Self {
        Calendar::Fixed(Utc.fix())
    }

    /// Instant of local midnight starting `date`.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        match self {
            Calendar::Local => resolve(&Local, midnight),
            Calendar::Fixed(offset) => resolve(offset, midnight),
        }
    }

    /// `[start_of_day(date), start_of_day(date + 1))`.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start_of_day(date),
            self.start_of_day(date + Duration::days(1)),
        )
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Calendar::Local => instant.with_timezone(&Local).date_naive(),
            Calendar::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// Interprets a wall-clock time in this calendar.
    pub fn from_local(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self {
            Calendar::Local => resolve(&Local, naive),
            Calendar::Fixed(offset) => resolve(offset, naive),
        }
    }

    pub fn to_local_string(&self, instant: DateTime<Utc>, format: &str) -> String {
        match self {
            Calendar::Local => instant.with_timezone(&Local).format(format).to_string(),
            Calendar::Fixed(offset) => instant.with_timezone(offset).format(format).to_string(),
        }
    }

    /// Monday of the ISO week containing `now`.
    pub fn current_week_start(&self, now: DateTime<Utc>) -> NaiveDate {
        week_start_of(self.date_of(now))
    }
}

/// Monday on or before `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Earliest instant for a wall-clock time; times skipped by a DST jump move forward
/// until they exist.
fn resolve<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = naive;
    for _ in 0..4 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc);
            }
            LocalResult::None => candidate += Duration::minutes(30),
        }
    }
    Utc.from_utc_datetime(&naive)
}

impl FromStr for Calendar {
    type Err = anyhow::Error;

    /// Accepts `local`, `utc`, or a fixed offset such as `+02:00` / `-0530`.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(Calendar::Local),
            "utc" | "z" => return Ok(Calendar::utc()),
            _ => {}
        }

        if !trimmed.starts_with(['+', '-']) {
            bail!("unrecognized timezone '{value}'");
        }
        trimmed
            .parse::<FixedOffset>()
            .map(Calendar::Fixed)
            .map_err(|err| anyhow!("invalid timezone offset '{value}': {err}"))
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Local => write!(f, "local"),
            Calendar::Fixed(offset) if offset.local_minus_utc() == 0 => write!(f, "utc"),
            Calendar::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

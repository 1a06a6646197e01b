//! Worked-time aggregation over arbitrary windows.
//!
//! All arithmetic is in integer milliseconds so that seven day windows add up
//! exactly to their week window.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::WorkSession;

use super::calendar::Calendar;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyHours {
    pub date: NaiveDate,
    /// Short weekday name, e.g. `Mon`.
    pub label: String,
    pub worked_ms: i64,
    pub hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    /// Monday of the week, in the summary's calendar.
    pub week_start: NaiveDate,
    pub total_ms: i64,
    pub total_hours: f64,
    pub daily_breakdown: Vec<DailyHours>,
}

/// Length of `[start, end)` that falls inside `[window_start, window_end)`, never negative.
pub fn clip_ms(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> i64 {
    let lower = start.max(window_start);
    let upper = end.min(window_end);
    (upper - lower).num_milliseconds().max(0)
}

/// Worked milliseconds of one session inside the window. Open sessions and open
/// gaps run until `now`.
pub fn session_ms_in_window(
    session: &WorkSession,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let span = clip_ms(
        session.start,
        session.effective_end(now),
        window_start,
        window_end,
    );
    if span == 0 {
        return 0;
    }

    let away: i64 = session
        .gaps
        .iter()
        .filter(|gap| !gap.is_deleted())
        .map(|gap| {
            clip_ms(
                gap.exit_time,
                gap.effective_return(now),
                window_start,
                window_end,
            )
        })
        .sum();

    (span - away).max(0)
}

pub fn worked_ms_for_window(
    sessions: &[WorkSession],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    sessions
        .iter()
        .map(|session| session_ms_in_window(session, window_start, window_end, now))
        .sum()
}

pub fn ms_to_hours(ms: i64) -> f64 {
    ms as f64 / MS_PER_HOUR
}

pub fn hours_for_window(
    sessions: &[WorkSession],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    ms_to_hours(worked_ms_for_window(
        sessions,
        window_start,
        window_end,
        now,
    ))
}

pub fn hours_for_date(
    sessions: &[WorkSession],
    date: NaiveDate,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> f64 {
    let (start, end) = calendar.day_bounds(date);
    hours_for_window(sessions, start, end, now)
}

/// Window covering the seven days from `week_start`.
pub fn week_bounds(week_start: NaiveDate, calendar: &Calendar) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        calendar.start_of_day(week_start),
        calendar.start_of_day(week_start + Duration::days(7)),
    )
}

pub fn weekly_summary(
    sessions: &[WorkSession],
    week_start: NaiveDate,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> WeeklySummary {
    let daily_breakdown: Vec<DailyHours> = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let (start, end) = calendar.day_bounds(date);
            let worked_ms = worked_ms_for_window(sessions, start, end, now);
            DailyHours {
                date,
                label: date.format("%a").to_string(),
                worked_ms,
                hours: ms_to_hours(worked_ms),
            }
        })
        .collect();

    let total_ms = daily_breakdown.iter().map(|day| day.worked_ms).sum();

    WeeklySummary {
        week_start,
        total_ms,
        total_hours: ms_to_hours(total_ms),
        daily_breakdown,
    }
}

/// `My hours for week of M/D/YYYY: H.H`
pub fn weekly_text_message(summary: &WeeklySummary) -> String {
    use chrono::Datelike;

    let start = summary.week_start;
    format!(
        "My hours for week of {}/{}/{}: {:.1}",
        start.month(),
        start.day(),
        start.year(),
        summary.total_hours
    )
}

//! Day and week windows of the system-local calendar across DST changes.
//!
//! Lives in its own test binary: it sets `TZ` for the whole process, and the
//! single test keeps every read of the local zone on one thread.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fenceclock_lib::report::{week_bounds, week_start_of, weekly_summary, worked_ms_for_window};
use fenceclock_lib::{Calendar, Gap, WorkSession};

/// US Eastern rules as a POSIX string, so no tzdata is needed.
const EASTERN: &str = "EST5EDT,M3.2.0,M11.1.0";

fn utc(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, day, hour, minute, 0).unwrap()
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn session(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> WorkSession {
    let mut session = WorkSession::open(id.into(), start);
    session.end = Some(end);
    session
}

fn with_gap(mut session: WorkSession, exit: DateTime<Utc>, returned: DateTime<Utc>) -> WorkSession {
    let mut gap = Gap::open(format!("{}-gap", session.id), session.id.clone(), exit);
    gap.return_time = Some(returned);
    session.gaps.push(gap);
    session
}

#[test]
fn local_calendar_across_dst_changes() {
    std::env::set_var("TZ", EASTERN);
    let calendar = Calendar::Local;

    // Spring forward: 2024-03-10 runs 00:00 EST to 00:00 EDT.
    let (start, end) = calendar.day_bounds(date(3, 10));
    assert_eq!(start, utc(3, 10, 5, 0));
    assert_eq!(end - start, Duration::hours(23));

    // Fall back: 2024-11-03 runs 00:00 EDT to 00:00 EST.
    let (start, end) = calendar.day_bounds(date(11, 3));
    assert_eq!(start, utc(11, 3, 4, 0));
    assert_eq!(end - start, Duration::hours(25));

    // 02:30 on the spring-forward night does not exist and moves to 03:00 EDT.
    let skipped = date(3, 10).and_hms_opt(2, 30, 0).unwrap();
    assert_eq!(calendar.from_local(skipped), utc(3, 10, 7, 0));

    let sessions = vec![
        // Saturday 22:00 EST through Sunday 10:00 EDT, away 01:30 EST to 03:30 EDT.
        with_gap(
            session("spring", utc(3, 10, 3, 0), utc(3, 10, 14, 0)),
            utc(3, 10, 6, 30),
            utc(3, 10, 7, 30),
        ),
        // Sunday 23:00 EDT into Monday, across the week boundary.
        session("spring-late", utc(3, 11, 3, 0), utc(3, 11, 5, 0)),
        // Sunday 23:00 EDT into Monday, the start of the autumn week.
        session("autumn-early", utc(10, 28, 3, 0), utc(10, 28, 6, 0)),
        // 00:30 EDT through 08:00 EST on the fall-back day.
        with_gap(
            session("autumn", utc(11, 3, 4, 30), utc(11, 3, 13, 0)),
            utc(11, 3, 5, 30),
            utc(11, 3, 6, 15),
        ),
    ];
    let now = utc(12, 1, 0, 0);

    let hour_ms = 3_600_000;
    for (day, expected_total, expected_sunday) in [
        (date(3, 10), 11 * hour_ms, 9 * hour_ms),
        (date(11, 3), 9 * hour_ms + 45 * 60_000, 7 * hour_ms + 45 * 60_000),
    ] {
        let week_start = week_start_of(day);
        let summary = weekly_summary(&sessions, week_start, &calendar, now);
        let (start, end) = week_bounds(week_start, &calendar);

        assert_eq!(summary.week_start, week_start);
        assert_eq!(summary.total_ms, worked_ms_for_window(&sessions, start, end, now));
        assert_eq!(summary.total_ms, expected_total);

        let sunday = &summary.daily_breakdown[6];
        assert_eq!(sunday.date, day);
        assert_eq!(sunday.worked_ms, expected_sunday);
    }
}

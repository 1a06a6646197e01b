//! Hours reporting for the summary screen and the weekly message.

mod aggregate;
mod calendar;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::Clock;
use crate::db::models::WorkSession;
use crate::store::SessionStore;

pub use aggregate::{
    clip_ms, hours_for_date, hours_for_window, ms_to_hours, session_ms_in_window, week_bounds,
    weekly_summary, weekly_text_message, worked_ms_for_window, DailyHours, WeeklySummary,
};
pub use calendar::{week_start_of, Calendar};

/// Store-backed entry point for reports. Reads only; `now` comes from the
/// injected clock so open sessions are counted up to the present.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    calendar: Calendar,
}

impl ReportService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, calendar: Calendar) -> Self {
        Self {
            store,
            clock,
            calendar,
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.now())
    }

    pub async fn hours_for_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64> {
        let sessions = self.store.fetch_sessions_overlapping(start, end).await?;
        Ok(hours_for_window(&sessions, start, end, self.now()))
    }

    pub async fn hours_for_date(&self, date: NaiveDate) -> Result<f64> {
        let (start, end) = self.calendar.day_bounds(date);
        self.hours_for_window(start, end).await
    }

    /// Sessions touching `date`, oldest first.
    pub async fn sessions_for_date(&self, date: NaiveDate) -> Result<Vec<WorkSession>> {
        let (start, end) = self.calendar.day_bounds(date);
        self.store.fetch_sessions_overlapping(start, end).await
    }

    pub fn current_week_start(&self) -> NaiveDate {
        self.calendar.current_week_start(self.now())
    }

    /// Summary of the Monday-keyed week containing `week_of`.
    pub async fn weekly_summary(&self, week_of: NaiveDate) -> Result<WeeklySummary> {
        let week_start = week_start_of(week_of);
        let (start, end) = week_bounds(week_start, &self.calendar);
        let sessions = self.store.fetch_sessions_overlapping(start, end).await?;
        Ok(weekly_summary(
            &sessions,
            week_start,
            &self.calendar,
            self.now(),
        ))
    }

    pub async fn weekly_text_message(&self, week_of: NaiveDate) -> Result<String> {
        let summary = self.weekly_summary(week_of).await?;
        Ok(weekly_text_message(&summary))
    }
}

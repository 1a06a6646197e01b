#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Result};
use assert_cmd::{cargo_bin_cmd, Command};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fenceclock_lib::{
    ClockController, ClockNotice, ControllerConfig, Gap, MemoryStore, SessionStore, WorkSession,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const GRACE: Duration = Duration::from_secs(300);

pub fn fence() -> Command {
    cargo_bin_cmd!("fenceclock")
}

/// Command with `--db` and `--settings` pointing inside `dir`, in UTC.
pub fn fence_in(dir: &TempDir) -> Command {
    let settings = dir.path().join("settings.json");
    if !settings.exists() {
        std::fs::write(&settings, r#"{"timezone": "utc"}"#).unwrap();
    }
    let mut cmd = fence();
    cmd.arg("--db")
        .arg(dir.path().join("fenceclock.sqlite3"))
        .arg("--settings")
        .arg(settings);
    cmd
}

/// 2024-03-04 (a Monday) at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
}

pub fn config() -> ControllerConfig {
    ControllerConfig {
        grace: GRACE,
        initial_check_done: true,
    }
}

pub async fn spawn(
    store: Arc<dyn SessionStore>,
) -> (ClockController, UnboundedReceiver<ClockNotice>) {
    ClockController::spawn(store, config()).await.unwrap()
}

pub fn drain(notices: &mut UnboundedReceiver<ClockNotice>) -> Vec<ClockNotice> {
    let mut received = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        received.push(notice);
    }
    received
}

/// Memory store whose writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("disk unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn insert_session(&self, session: &WorkSession) -> Result<()> {
        self.check()?;
        self.inner.insert_session(session).await
    }

    async fn save_session(&self, session: &WorkSession) -> Result<()> {
        self.check()?;
        self.inner.save_session(session).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.check()?;
        self.inner.delete_session(session_id).await
    }

    async fn insert_gap(&self, gap: &Gap) -> Result<()> {
        self.check()?;
        self.inner.insert_gap(gap).await
    }

    async fn save_gap(&self, gap: &Gap) -> Result<()> {
        self.check()?;
        self.inner.save_gap(gap).await
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        self.inner.fetch_session(session_id).await
    }

    async fn fetch_open_session(&self) -> Result<Option<WorkSession>> {
        self.inner.fetch_open_session().await
    }

    async fn fetch_latest_closed_session(&self) -> Result<Option<WorkSession>> {
        self.inner.fetch_latest_closed_session().await
    }

    async fn fetch_sessions_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkSession>> {
        self.inner.fetch_sessions_overlapping(start, end).await
    }

    async fn fetch_gap(&self, gap_id: &str) -> Result<Option<Gap>> {
        self.inner.fetch_gap(gap_id).await
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::report::Calendar;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const MIN_GRACE_SECONDS: u64 = 300;
pub const MAX_GRACE_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingSettings {
    pub grace_seconds: u64,
    pub timezone: String,
    /// Set once the first zone evaluation after install has happened.
    pub initial_check_done: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            grace_seconds: MIN_GRACE_SECONDS,
            timezone: Calendar::Local.to_string(),
            initial_check_done: false,
        }
    }
}

impl TrackingSettings {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(clamp_grace(self.grace_seconds))
    }

    pub fn calendar(&self) -> Calendar {
        match self.timezone.parse() {
            Ok(calendar) => calendar,
            Err(err) => {
                log_warn!(
                    "Invalid timezone {:?} in settings ({err}); using local time",
                    self.timezone
                );
                Calendar::Local
            }
        }
    }
}

pub fn clamp_grace(seconds: u64) -> u64 {
    seconds.clamp(MIN_GRACE_SECONDS, MAX_GRACE_SECONDS)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<TrackingSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing or unreadable file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!(
                    "Ignoring malformed settings file {}: {err}",
                    path.display()
                );
                TrackingSettings::default()
            })
        } else {
            TrackingSettings::default()
        };
        data.grace_seconds = clamp_grace(data.grace_seconds);

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> TrackingSettings {
        self.read().clone()
    }

    pub fn grace(&self) -> Duration {
        self.read().grace()
    }

    pub fn calendar(&self) -> Calendar {
        self.read().calendar()
    }

    pub fn initial_check_done(&self) -> bool {
        self.read().initial_check_done
    }

    /// Stores a new grace period, clamped into range. Returns the stored value.
    pub fn set_grace_seconds(&self, seconds: u64) -> Result<u64> {
        let clamped = clamp_grace(seconds);
        if clamped != seconds {
            log_warn!("Grace period {seconds}s out of range; using {clamped}s");
        }
        self.update(|settings| settings.grace_seconds = clamped)?;
        Ok(clamped)
    }

    pub fn set_timezone(&self, calendar: Calendar) -> Result<()> {
        self.update(|settings| settings.timezone = calendar.to_string())
    }

    pub fn mark_initial_check_done(&self) -> Result<()> {
        if self.initial_check_done() {
            return Ok(());
        }
        log_info!("First zone evaluation recorded");
        self.update(|settings| settings.initial_check_done = true)
    }

    fn update(&self, apply: impl FnOnce(&mut TrackingSettings)) -> Result<()> {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &TrackingSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackingSettings> {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackingSettings> {
        self.data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Geofence-driven work session tracking.
//!
//! Zone enter/exit signals and manual actions flow through a single
//! [`ClockController`] task that owns the open session, debounces exits with a
//! grace timer and writes sessions and gaps to a [`SessionStore`]. Reports
//! read the store back through [`ReportService`].

pub mod cli;
pub mod clock;
pub mod db;
pub mod report;
pub mod settings;
pub mod store;
mod utils;

pub use clock::{
    ClockController, ClockNotice, ClockSnapshot, ClockStatus, ControllerConfig, EditError,
    GeofenceTransition, ManualClockAction, RecordEdit,
};
pub use db::{Database, Gap, GapStatus, WorkSession};
pub use report::{Calendar, DailyHours, ReportService, WeeklySummary};
pub use settings::{SettingsStore, TrackingSettings};
pub use store::{MemoryStore, SessionStore};
pub use utils::logging::init_logging;

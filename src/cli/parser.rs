use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Geofence-driven work session tracker
#[derive(Parser, Debug)]
#[command(
    name = "fenceclock",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track work sessions from geofence enter/exit signals and report hours",
    long_about = None
)]
pub struct Cli {
    /// Override database path
    #[arg(global = true, long = "db")]
    pub db: Option<PathBuf>,

    /// Override settings file path
    #[arg(global = true, long = "settings")]
    pub settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show whether you are clocked in and today's hours
    Status,

    /// Clock in manually
    In {
        /// Clock-in time (RFC3339 or "YYYY-MM-DD HH:MM"); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Clock out manually
    Out {
        /// Clock-out time (RFC3339 or "YYYY-MM-DD HH:MM"); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Read `enter|exit|in|out [time]` lines from stdin and print notices as JSON
    Watch,

    /// Hours worked on a day
    Day {
        /// Date (YYYY-MM-DD); defaults to today
        date: Option<String>,
    },

    /// Hours worked in the Monday-based week containing a day
    Week {
        /// Any date in the week (YYYY-MM-DD); defaults to today
        date: Option<String>,

        /// Print only the shareable summary line
        #[arg(long)]
        message: bool,
    },

    /// List sessions and gaps touching a day
    Sessions {
        /// Date (YYYY-MM-DD); defaults to today
        date: Option<String>,
    },

    /// Correct or delete recorded gaps
    Gap {
        #[command(subcommand)]
        action: GapAction,
    },

    /// Correct or delete recorded sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum GapAction {
    /// Exclude a gap from totals (reversible)
    Delete { id: String },

    /// Count a deleted gap again
    Restore { id: String },

    /// Change a gap's exit and return times
    Edit {
        id: String,

        #[arg(long = "exit")]
        exit_time: String,

        /// Omit to leave the gap open (latest gap of the open session only)
        #[arg(long = "return")]
        return_time: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Change a session's start and end times
    Edit {
        id: String,

        #[arg(long)]
        start: String,

        /// Required for closed sessions; must be omitted for the open one
        #[arg(long)]
        end: Option<String>,
    },

    /// Delete a session and its gaps
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings
    Show,

    /// Set the grace period in seconds (300 to 3600)
    Grace { seconds: u64 },

    /// Set the reporting timezone: local, utc or an offset such as +02:00
    Timezone {
        #[arg(allow_hyphen_values = true)]
        timezone: String,
    },
}

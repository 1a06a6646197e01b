//! Command-line front end: the manual input boundary and the summary screen.

mod commands;
mod input;
mod parser;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::db::Database;
use crate::settings::SettingsStore;
use crate::utils::logging::init_logging;

use commands::App;
pub use input::{parse_date, parse_timestamp, parse_watch_line, WatchInput};
pub use parser::{Cli, Commands, ConfigAction, GapAction, SessionAction};

const APP_DIR: &str = "fenceclock";

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| anyhow!("could not determine a data directory; pass --db and --settings"))
}

/// Parses the command line and runs the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_cli(cli).await
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => default_data_dir()?.join("settings.json"),
    };
    let settings = Arc::new(SettingsStore::new(settings_path)?);

    // Config edits never touch the database.
    if let Commands::Config { action } = cli.command {
        return commands::handle_config(&settings, action);
    }

    let db_path = match cli.db {
        Some(path) => path,
        None => default_data_dir()?.join("fenceclock.sqlite3"),
    };
    let app = App {
        store: Arc::new(Database::new(db_path)?),
        settings,
    };

    match cli.command {
        Commands::Status => commands::handle_status(&app).await,
        Commands::In { at } => commands::handle_manual(&app, true, at.as_deref()).await,
        Commands::Out { at } => commands::handle_manual(&app, false, at.as_deref()).await,
        Commands::Watch => commands::handle_watch(&app).await,
        Commands::Day { date } => commands::handle_day(&app, date.as_deref()).await,
        Commands::Week { date, message } => {
            commands::handle_week(&app, date.as_deref(), message).await
        }
        Commands::Sessions { date } => commands::handle_sessions(&app, date.as_deref()).await,
        Commands::Gap { action } => commands::handle_gap(&app, action).await,
        Commands::Session { action } => commands::handle_session(&app, action).await,
        Commands::Config { .. } => Ok(()),
    }
}

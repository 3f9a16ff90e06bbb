//! Create the local fieldsync database.
//!
//! The database lives at `~/.fieldsync/data/fieldsync.db` unless `--db`
//! (or `FIELDSYNC_DB`) points elsewhere. Schema and migrations are applied
//! on first open. The first init also writes a default `config.json`.

use crate::cli::commands::Context;
use crate::config::{resolve_db_path, save_settings_to, settings_path, Settings};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct InitOutput {
    database: PathBuf,
    reinitialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_created: Option<PathBuf>,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if a database exists and `force` is not set,
/// or an error if the directory or database cannot be created.
pub fn execute(ctx: &Context<'_>, force: bool) -> Result<()> {
    let db_path = resolve_db_path(ctx.db).ok_or_else(|| {
        Error::Config("Could not determine the fieldsync data directory".to_string())
    })?;
    let output = initialize(&db_path, &settings_path()?, force)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        let verb = if output.reinitialized {
            "Reinitialized"
        } else {
            "Initialized"
        };
        println!("{} fieldsync database", verb.green());
        println!("  Database: {}", output.database.display());
        if let Some(ref path) = output.config_created {
            println!("  Config:   {} (set upload.endpoint before pushing)", path.display());
        }
    }

    Ok(())
}

fn initialize(db_path: &Path, config_path: &Path, force: bool) -> Result<InitOutput> {
    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized {
            path: db_path.to_path_buf(),
        });
    }
    if existed {
        remove_database(db_path)?;
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    SqliteStorage::open(db_path)?;

    let config_created = if config_path.exists() {
        None
    } else {
        save_settings_to(config_path, &Settings::default())?;
        Some(config_path.to_path_buf())
    };

    Ok(InitOutput {
        database: db_path.to_path_buf(),
        reinitialized: existed,
        config_created,
    })
}

/// Delete a database file and its WAL side files.
fn remove_database(db_path: &Path) -> Result<()> {
    fs::remove_file(db_path)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(side)?;
        }
    }
    Ok(())
}

//! Command implementations.

pub mod completions;
pub mod dead_letter;
pub mod delta;
pub mod init;
pub mod push;
pub mod queue;
pub mod record;
pub mod version;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{default_actor, resolve_db_path, Settings};
use crate::error::{Error, Result};
use crate::model::{EntityType, Operation};
use crate::storage::{AuditLog, SqliteStorage};
use crate::sync::{EventSink, FanoutSink, SyncOrchestrator, TracingSink, Uploader};

/// Global options every command receives.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub db: Option<&'a Path>,
    pub actor: Option<&'a str>,
    pub json: bool,
}

impl Context<'_> {
    /// Path of an existing database.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if no database exists at the resolved path.
    pub fn db_path(&self) -> Result<PathBuf> {
        let db_path = resolve_db_path(self.db).ok_or(Error::NotInitialized)?;
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }
        Ok(db_path)
    }

    #[must_use]
    pub fn actor(&self) -> String {
        self.actor.map_or_else(default_actor, ToString::to_string)
    }

    /// Open the database for direct reads and writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is missing or cannot be opened.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        Ok(SqliteStorage::open(&self.db_path()?)?.with_actor(&self.actor()))
    }

    /// Open a sync engine over the database, logging events to tracing and
    /// the audit table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the queue
    /// cannot be loaded.
    pub fn open_engine<U: Uploader>(
        &self,
        settings: &Settings,
        uploader: U,
    ) -> Result<SyncOrchestrator<SqliteStorage, U>> {
        let db_path = self.db_path()?;
        let actor = self.actor();
        let storage = SqliteStorage::open(&db_path)?.with_actor(&actor);
        let audit = AuditLog::open(&db_path, &actor)?;

        let sinks: Vec<Box<dyn EventSink>> = vec![Box::new(TracingSink), Box::new(audit)];
        Ok(SyncOrchestrator::open(storage, uploader, settings.retry)?
            .with_sink(FanoutSink::new(sinks)))
    }
}

pub(crate) fn parse_entity_type(s: &str) -> Result<EntityType> {
    s.parse().map_err(Error::InvalidArgument)
}

pub(crate) fn parse_operation(s: &str) -> Result<Operation> {
    s.parse().map_err(Error::InvalidArgument)
}

/// Parse a JSON object given inline or as `@path`.
pub(crate) fn read_json_arg(arg: &str) -> Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)?,
        None => arg.to_string(),
    };

    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::InvalidPayload(format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(Error::InvalidPayload("expected a JSON object".to_string()));
    }
    Ok(value)
}

pub(crate) fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

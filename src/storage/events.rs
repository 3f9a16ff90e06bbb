//! Audit event storage and retrieval.
//!
//! Every engine event can be appended to the `events` table, giving a
//! per-item history of enqueue, failure, conflict and removal.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Result};
use tracing::warn;

use crate::sync::events::{EventSink, SyncEvent};

/// An audit event record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Event {
    pub id: i64,
    pub event_type: String,
    pub item_id: Option<String>,
    pub actor: String,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(event_type: &str, item_id: Option<&str>, actor: &str) -> Self {
        Self {
            id: 0,
            event_type: event_type.to_string(),
            item_id: item_id.map(ToString::to_string),
            actor: actor.to_string(),
            detail: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Build the audit row for an engine event, detail serialized as JSON.
    #[must_use]
    pub fn from_sync_event(event: &SyncEvent, actor: &str) -> Self {
        let mut row = Self::new(event.kind(), event.item_id(), actor);
        row.detail = serde_json::to_string(event).ok();
        row
    }

    /// Attach a free-form detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (event_type, item_id, actor, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            event.event_type,
            event.item_id,
            event.actor,
            event.detail,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for a queue item, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(conn: &Connection, item_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, event_type, item_id, actor, detail, created_at
         FROM events
         WHERE item_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![item_id, limit], map_event)?;
    rows.collect()
}

/// Count events of one type.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_events(conn: &Connection, event_type: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM events WHERE event_type = ?1",
        [event_type],
        |row| row.get(0),
    )
}

fn map_event(row: &rusqlite::Row<'_>) -> Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        event_type: row.get(1)?,
        item_id: row.get(2)?,
        actor: row.get(3)?,
        detail: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Event sink that appends every engine event to the audit table.
///
/// Holds its own connection so it can sit next to the storage the
/// orchestrator owns. Write failures are logged and dropped.
pub struct AuditLog {
    conn: Mutex<Connection>,
    actor: String,
}

impl AuditLog {
    /// Open the audit log of the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path, actor: &str) -> crate::error::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        super::schema::apply_schema(&conn)?;
        Ok(Self::from_connection(conn, actor))
    }

    /// Wrap an already-initialized connection.
    #[must_use]
    pub fn from_connection(conn: Connection, actor: &str) -> Self {
        Self {
            conn: Mutex::new(conn),
            actor: actor.to_string(),
        }
    }

    /// Events recorded for a queue item, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn events_for(&self, item_id: &str) -> crate::error::Result<Vec<Event>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| crate::error::Error::Other("audit log lock poisoned".to_string()))?;
        Ok(get_events(&conn, item_id, None)?)
    }
}

impl EventSink for AuditLog {
    fn emit(&self, event: &SyncEvent) {
        let Ok(conn) = self.conn.lock() else {
            warn!(event = event.kind(), "Audit log lock poisoned, dropping event");
            return;
        };
        if let Err(e) = insert_event(&conn, &Event::from_sync_event(event, &self.actor)) {
            warn!(event = event.kind(), error = %e, "Failed to write audit event");
        }
    }
}

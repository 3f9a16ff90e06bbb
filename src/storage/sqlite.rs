//! SQLite storage implementation.
//!
//! The durable persistence provider for fieldsync. Every write goes through
//! [`SqliteStorage::mutate`], which wraps the change in an IMMEDIATE
//! transaction and writes its audit events in the same commit.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};
use crate::model::{DeadLetter, DeadLetterReason, EntityType, Operation, SyncQueueItem, Syncable};
use crate::storage::events::{get_events, insert_event, Event};
use crate::storage::schema::apply_schema;
use crate::storage::traits::{SyncStore, WatermarkStore};

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    actor: String,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Device or user performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, event_type: &str, item_id: Option<&str>) {
        self.events.push(Event::new(event_type, item_id, &self.actor));
    }

    /// Record an event with a detail string.
    pub fn record_detail(&mut self, event_type: &str, item_id: Option<&str>, detail: &str) {
        self.events
            .push(Event::new(event_type, item_id, &self.actor).with_detail(detail));
    }
}

/// A record row as stored locally.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredRecord {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: serde_json::Value,
    pub updated_at: i64,
    pub synced_at: Option<i64>,
    pub unsynced_changes: bool,
}

impl Syncable for StoredRecord {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn synced_at(&self) -> Option<i64> {
        self.synced_at
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: "fieldsync".to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: "fieldsync".to_string(),
        })
    }

    /// Attribute audit events written through this handle to `actor`.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, &self.actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Queue Operations
    // ==================

    /// Number of persisted queue items.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn queue_len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ==================
    // Dead Letters
    // ==================

    /// All dead letters, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, operation, payload, created_at,
                    retry_count, last_attempt_at, last_error, reason, error, abandoned_at
             FROM dead_letters
             ORDER BY abandoned_at ASC, id ASC",
        )?;
        let rows = stmt.query_map([], map_dead_letter)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Look up one dead letter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_dead_letter(&self, id: &str) -> Result<Option<DeadLetter>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, entity_type, entity_id, operation, payload, created_at,
                        retry_count, last_attempt_at, last_error, reason, error, abandoned_at
                 FROM dead_letters WHERE id = ?1",
                [id],
                map_dead_letter,
            )
            .optional()?)
    }

    /// Remove a dead letter and hand it back (used by requeue).
    ///
    /// # Errors
    ///
    /// Returns `DeadLetterNotFound` if no entry has this id.
    pub fn take_dead_letter(&mut self, id: &str) -> Result<DeadLetter> {
        let letter = self
            .get_dead_letter(id)?
            .ok_or_else(|| Error::DeadLetterNotFound { id: id.to_string() })?;

        self.mutate("take_dead_letter", |tx, ctx| {
            tx.execute("DELETE FROM dead_letters WHERE id = ?1", [id])?;
            ctx.record_event("dead_letter_taken", Some(id));
            Ok(())
        })?;

        Ok(letter)
    }

    // ==================
    // Records
    // ==================

    /// Local records of one type (or all types), oldest modification first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_records(&self, entity_type: Option<EntityType>) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_type, entity_id, payload, updated_at, synced_at, unsynced_changes
             FROM records
             WHERE ?1 IS NULL OR entity_type = ?1
             ORDER BY updated_at ASC, entity_id ASC",
        )?;
        let rows = stmt.query_map([entity_type.map(|t| t.as_str())], map_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// One local record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_record(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<StoredRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT entity_type, entity_id, payload, updated_at, synced_at, unsynced_changes
                 FROM records WHERE entity_type = ?1 AND entity_id = ?2",
                [entity_type.as_str(), entity_id],
                map_record,
            )
            .optional()?)
    }
}

impl SqliteStorage {
    /// Audit history of one queue item, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn item_history(&self, item_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, item_id, limit)?)
    }
}

impl SyncStore for SqliteStorage {
    fn load_all(&self) -> Result<Vec<SyncQueueItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, operation, payload, created_at,
                    retry_count, last_attempt_at, last_error
             FROM sync_queue
             ORDER BY created_at ASC, position ASC",
        )?;
        let rows = stmt.query_map([], map_queue_item)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn save_all(&mut self, items: &[SyncQueueItem]) -> Result<()> {
        self.mutate("save_queue", |tx, _ctx| {
            tx.execute("DELETE FROM sync_queue", [])?;
            for (position, item) in items.iter().enumerate() {
                insert_queue_row(tx, item, i64::try_from(position).unwrap_or(i64::MAX))?;
            }
            Ok(())
        })
    }

    fn insert_item(&mut self, item: &SyncQueueItem) -> Result<()> {
        self.mutate("insert_item", |tx, _ctx| {
            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM sync_queue",
                [],
                |row| row.get(0),
            )?;
            insert_queue_row(tx, item, position)
        })
    }

    fn update_item(&mut self, item: &SyncQueueItem) -> Result<bool> {
        let payload = serde_json::to_string(&item.payload)?;
        self.mutate("update_item", |tx, _ctx| {
            let changed = tx.execute(
                "UPDATE sync_queue
                 SET payload = ?2, retry_count = ?3, last_attempt_at = ?4, last_error = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    item.id,
                    payload,
                    item.retry_count,
                    item.last_attempt_at,
                    item.last_error,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn remove_item(&mut self, id: &str) -> Result<bool> {
        self.mutate("remove_item", |tx, _ctx| {
            let changed = tx.execute("DELETE FROM sync_queue WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    fn load_base(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM sync_bases WHERE entity_type = ?1 AND entity_id = ?2",
                [entity_type.as_str(), entity_id],
                |row| row.get(0),
            )
            .optional()?;
        text.map(|t| serde_json::from_str(&t).map_err(Error::from))
            .transpose()
    }

    fn save_base(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        base: &serde_json::Value,
    ) -> Result<()> {
        let text = serde_json::to_string(base)?;
        let updated_at = base.get("updated_at").and_then(serde_json::Value::as_i64);
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("save_base", |tx, _ctx| {
            tx.execute(
                "INSERT INTO sync_bases (entity_type, entity_id, payload, updated_at, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                   payload = excluded.payload,
                   updated_at = excluded.updated_at,
                   saved_at = excluded.saved_at",
                rusqlite::params![entity_type.as_str(), entity_id, text, updated_at, now],
            )?;
            Ok(())
        })
    }

    fn clear_base(&mut self, entity_type: EntityType, entity_id: &str) -> Result<()> {
        self.mutate("clear_base", |tx, _ctx| {
            tx.execute(
                "DELETE FROM sync_bases WHERE entity_type = ?1 AND entity_id = ?2",
                [entity_type.as_str(), entity_id],
            )?;
            Ok(())
        })
    }

    fn save_record(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        record: &serde_json::Value,
    ) -> Result<()> {
        let text = serde_json::to_string(record)?;
        let updated_at = record
            .get("updated_at")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let synced_at = record.get("synced_at").and_then(serde_json::Value::as_i64);
        let unsynced = record
            .get("unsynced_changes")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(synced_at.is_none());

        self.mutate("save_record", |tx, _ctx| {
            tx.execute(
                "INSERT INTO records
                   (entity_type, entity_id, payload, updated_at, synced_at, unsynced_changes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                   payload = excluded.payload,
                   updated_at = excluded.updated_at,
                   synced_at = excluded.synced_at,
                   unsynced_changes = excluded.unsynced_changes",
                rusqlite::params![
                    entity_type.as_str(),
                    entity_id,
                    text,
                    updated_at,
                    synced_at,
                    unsynced
                ],
            )?;
            Ok(())
        })
    }

    fn mark_synced(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        version: i64,
        synced_at: i64,
    ) -> Result<bool> {
        self.mutate("mark_synced", |tx, _ctx| {
            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT payload, updated_at FROM records
                     WHERE entity_type = ?1 AND entity_id = ?2",
                    [entity_type.as_str(), entity_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((text, updated_at)) = current else {
                return Ok(false);
            };
            if updated_at != version {
                return Ok(false);
            }

            let mut payload: serde_json::Value = serde_json::from_str(&text)?;
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("synced_at".into(), synced_at.into());
                obj.insert("unsynced_changes".into(), false.into());
            }

            tx.execute(
                "UPDATE records SET payload = ?3, synced_at = ?4, unsynced_changes = 0
                 WHERE entity_type = ?1 AND entity_id = ?2",
                rusqlite::params![
                    entity_type.as_str(),
                    entity_id,
                    serde_json::to_string(&payload)?,
                    synced_at
                ],
            )?;
            Ok(true)
        })
    }

    fn append_dead_letter(&mut self, letter: &DeadLetter) -> Result<()> {
        let item = &letter.item;
        let payload = serde_json::to_string(&item.payload)?;
        self.mutate("append_dead_letter", |tx, ctx| {
            tx.execute(
                "INSERT OR REPLACE INTO dead_letters
                   (id, entity_type, entity_id, operation, payload, created_at, retry_count,
                    last_attempt_at, last_error, reason, error, abandoned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    item.id,
                    item.entity_type.as_str(),
                    item.entity_id,
                    item.operation.as_str(),
                    payload,
                    item.created_at,
                    item.retry_count,
                    item.last_attempt_at,
                    item.last_error,
                    letter.reason.as_str(),
                    letter.error,
                    letter.abandoned_at,
                ],
            )?;
            tx.execute("DELETE FROM sync_queue WHERE id = ?1", [&item.id])?;
            ctx.record_detail("dead_lettered", Some(&item.id), letter.reason.as_str());
            Ok(())
        })
    }

    fn acquire_pass_lease(&mut self, holder: &str, now: i64, expires_at: i64) -> Result<bool> {
        self.mutate("acquire_pass_lease", |tx, _ctx| {
            let current: Option<(String, i64)> = tx
                .query_row(
                    "SELECT holder, expires_at FROM pass_lease WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((owner, until)) = current {
                if owner != holder && until > now {
                    return Ok(false);
                }
            }

            tx.execute(
                "INSERT INTO pass_lease (id, holder, expires_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                   holder = excluded.holder,
                   expires_at = excluded.expires_at",
                rusqlite::params![holder, expires_at],
            )?;
            Ok(true)
        })
    }

    fn release_pass_lease(&mut self, holder: &str) -> Result<()> {
        self.mutate("release_pass_lease", |tx, _ctx| {
            tx.execute("DELETE FROM pass_lease WHERE id = 1 AND holder = ?1", [holder])?;
            Ok(())
        })
    }
}

impl WatermarkStore for SqliteStorage {
    fn watermark(&self, scope: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT at FROM watermarks WHERE scope = ?1",
                [scope],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_watermark(&mut self, scope: &str, at: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("set_watermark", |tx, ctx| {
            tx.execute(
                "INSERT INTO watermarks (scope, at, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(scope) DO UPDATE SET
                   at = excluded.at,
                   updated_at = excluded.updated_at",
                rusqlite::params![scope, at, now],
            )?;
            ctx.record_detail("watermark_set", None, &format!("{scope}={at}"));
            Ok(())
        })
    }
}

fn insert_queue_row(tx: &Transaction, item: &SyncQueueItem, position: i64) -> Result<()> {
    tx.execute(
        "INSERT INTO sync_queue (id, position, entity_type, entity_id, operation, payload,
                                 created_at, retry_count, last_attempt_at, last_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            item.id,
            position,
            item.entity_type.as_str(),
            item.entity_id,
            item.operation.as_str(),
            serde_json::to_string(&item.payload)?,
            item.created_at,
            item.retry_count,
            item.last_attempt_at,
            item.last_error,
        ],
    )?;
    Ok(())
}

// ==================
// Row Mapping
// ==================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_entity_type(idx: usize, s: &str) -> rusqlite::Result<EntityType> {
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_operation(idx: usize, s: &str) -> rusqlite::Result<Operation> {
    s.parse().map_err(|e| conversion_error(idx, e))
}

fn parse_payload(idx: usize, s: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(s).map_err(|e| conversion_error(idx, e.to_string()))
}

fn map_queue_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueItem> {
    Ok(SyncQueueItem {
        id: row.get(0)?,
        entity_type: parse_entity_type(1, &row.get::<_, String>(1)?)?,
        entity_id: row.get(2)?,
        operation: parse_operation(3, &row.get::<_, String>(3)?)?,
        payload: parse_payload(4, &row.get::<_, String>(4)?)?,
        created_at: row.get(5)?,
        retry_count: row.get(6)?,
        last_attempt_at: row.get(7)?,
        last_error: row.get(8)?,
    })
}

fn map_dead_letter(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeadLetter> {
    Ok(DeadLetter {
        item: map_queue_item(row)?,
        reason: DeadLetterReason::from_str(&row.get::<_, String>(9)?),
        error: row.get(10)?,
        abandoned_at: row.get(11)?,
    })
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRecord> {
    Ok(StoredRecord {
        entity_type: parse_entity_type(0, &row.get::<_, String>(0)?)?,
        entity_id: row.get(1)?,
        payload: parse_payload(2, &row.get::<_, String>(2)?)?,
        updated_at: row.get(3)?,
        synced_at: row.get(4)?,
        unsynced_changes: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::get_events;
    use serde_json::json;

    fn item(id: &str, created_at: i64) -> SyncQueueItem {
        SyncQueueItem::new(
            id.to_string(),
            EntityType::Job,
            Operation::Update,
            json!({"id": format!("job_{id}"), "updated_at": created_at}),
            created_at,
        )
    }

    #[test]
    fn test_save_all_replaces_queue_in_fifo_order() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        storage
            .save_all(&[item("sq_b", 2), item("sq_a", 1), item("sq_c", 2)])
            .unwrap();
        let ids: Vec<String> = storage.load_all().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["sq_a", "sq_b", "sq_c"]);

        let mut failed = item("sq_c", 3);
        failed.retry_count = 2;
        failed.last_attempt_at = Some(500);
        failed.last_error = Some("timeout".into());
        storage.save_all(&[failed]).unwrap();

        let loaded = storage.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].retry_count, 2);
        assert_eq!(loaded[0].last_attempt_at, Some(500));
        assert_eq!(loaded[0].last_error.as_deref(), Some("timeout"));
        assert_eq!(loaded[0].entity_id.as_deref(), Some("job_sq_c"));
    }

    #[test]
    fn test_per_item_writes_leave_other_items_alone() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.insert_item(&item("sq_1", 1)).unwrap();
        storage.insert_item(&item("sq_2", 1)).unwrap();
        assert!(storage.insert_item(&item("sq_1", 5)).is_err());

        let mut failed = item("sq_2", 1);
        failed.retry_count = 1;
        failed.last_error = Some("timeout".into());
        assert!(storage.update_item(&failed).unwrap());
        assert!(!storage.update_item(&item("sq_9", 1)).unwrap());

        assert!(storage.remove_item("sq_1").unwrap());
        assert!(!storage.remove_item("sq_1").unwrap());

        let loaded = storage.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "sq_2");
        assert_eq!(loaded[0].retry_count, 1);
    }

    #[test]
    fn test_two_handles_see_each_others_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldsync.db");
        let mut first = SqliteStorage::open(&path).unwrap();
        let mut second = SqliteStorage::open(&path).unwrap();

        first.insert_item(&item("sq_1", 1)).unwrap();
        second.insert_item(&item("sq_2", 2)).unwrap();
        second.remove_item("sq_1").unwrap();

        let ids: Vec<String> = first.load_all().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["sq_2"]);
    }

    #[test]
    fn test_pass_lease_has_one_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldsync.db");
        let mut first = SqliteStorage::open(&path).unwrap();
        let mut second = SqliteStorage::open(&path).unwrap();

        assert!(first.acquire_pass_lease("pass_a", 0, 1_000).unwrap());
        assert!(!second.acquire_pass_lease("pass_b", 500, 1_500).unwrap());
        // renewal by the holder
        assert!(first.acquire_pass_lease("pass_a", 600, 2_000).unwrap());
        assert!(!second.acquire_pass_lease("pass_b", 1_500, 2_500).unwrap());

        // expired leases can be taken over
        assert!(second.acquire_pass_lease("pass_b", 2_000, 3_000).unwrap());

        // only the holder releases
        first.release_pass_lease("pass_a").unwrap();
        assert!(!first.acquire_pass_lease("pass_a", 2_100, 3_100).unwrap());
        second.release_pass_lease("pass_b").unwrap();
        assert!(first.acquire_pass_lease("pass_a", 2_200, 3_200).unwrap());
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldsync.db");

        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.save_all(&[item("sq_1", 1), item("sq_2", 2)]).unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert_eq!(storage.queue_len().unwrap(), 2);
        assert_eq!(storage.load_all().unwrap()[1].id, "sq_2");
    }

    #[test]
    fn test_base_round_trip_and_clear() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.load_base(EntityType::Job, "job_1").unwrap().is_none());

        let base = json!({"id": "job_1", "status": "Open", "updated_at": 10});
        storage.save_base(EntityType::Job, "job_1", &base).unwrap();
        assert_eq!(storage.load_base(EntityType::Job, "job_1").unwrap(), Some(base));

        storage.clear_base(EntityType::Job, "job_1").unwrap();
        assert!(storage.load_base(EntityType::Job, "job_1").unwrap().is_none());
    }

    #[test]
    fn test_mark_synced_respects_version() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .save_record(
                EntityType::Job,
                "job_1",
                &json!({"id": "job_1", "updated_at": 10, "unsynced_changes": true}),
            )
            .unwrap();

        assert!(!storage.mark_synced(EntityType::Job, "job_1", 9, 50).unwrap());
        assert!(storage.mark_synced(EntityType::Job, "job_1", 10, 50).unwrap());

        let record = storage.get_record(EntityType::Job, "job_1").unwrap().unwrap();
        assert_eq!(record.synced_at, Some(50));
        assert!(!record.unsynced_changes);
        assert_eq!(record.payload["synced_at"], 50);
    }

    #[test]
    fn test_dead_letter_append_list_take() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_actor("tech-7");
        let mut abandoned = item("sq_9", 9);
        abandoned.retry_count = 3;
        storage.insert_item(&item("sq_9", 9)).unwrap();

        storage
            .append_dead_letter(&DeadLetter {
                item: abandoned,
                reason: DeadLetterReason::Exhausted,
                error: "503".into(),
                abandoned_at: 4_000,
            })
            .unwrap();

        assert_eq!(storage.queue_len().unwrap(), 0);
        let letters = storage.list_dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].item.retry_count, 3);
        assert_eq!(letters[0].reason, DeadLetterReason::Exhausted);

        let events = get_events(storage.conn(), "sq_9", None).unwrap();
        assert_eq!(events[0].event_type, "dead_lettered");
        assert_eq!(events[0].actor, "tech-7");

        let taken = storage.take_dead_letter("sq_9").unwrap();
        assert_eq!(taken.error, "503");
        assert!(storage.list_dead_letters().unwrap().is_empty());
        assert!(matches!(
            storage.take_dead_letter("sq_9"),
            Err(Error::DeadLetterNotFound { .. })
        ));
    }

    #[test]
    fn test_watermarks_are_per_scope() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.watermark("jobs").unwrap(), None);

        storage.set_watermark("jobs", 100).unwrap();
        storage.set_watermark("jobs", 200).unwrap();
        storage.set_watermark("nodes", 50).unwrap();

        assert_eq!(storage.watermark("jobs").unwrap(), Some(200));
        assert_eq!(storage.watermark("nodes").unwrap(), Some(50));
    }

    #[test]
    fn test_list_records_filters_by_type() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .save_record(EntityType::Job, "job_1", &json!({"id": "job_1", "updated_at": 2}))
            .unwrap();
        storage
            .save_record(EntityType::Node, "node_1", &json!({"id": "node_1", "updated_at": 1}))
            .unwrap();

        assert_eq!(storage.list_records(None).unwrap().len(), 2);
        let jobs = storage.list_records(Some(EntityType::Job)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].entity_id, "job_1");
        assert!(jobs[0].unsynced_changes);
    }
}

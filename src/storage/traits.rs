//! Storage trait definitions.
//!
//! These are the persistence seams of the sync engine. Every method is
//! synchronous; a failing call is fatal to the operation that made it and
//! is never retried by the engine.
//!
//! Several handles (and processes) may share one store. Queue writes are
//! therefore per item, and a pass claims the store-wide pass lease before
//! it uploads anything.

use crate::error::Result;
use crate::model::{DeadLetter, EntityType, SyncQueueItem};

/// Durable home of the queue, merge bases and local records.
pub trait SyncStore: Send {
    /// Load every pending queue item.
    fn load_all(&self) -> Result<Vec<SyncQueueItem>>;

    /// Replace the persisted queue with `items`.
    ///
    /// Must be atomic: after a crash the store holds either the old or the
    /// new queue, never a mix.
    fn save_all(&mut self, items: &[SyncQueueItem]) -> Result<()>;

    /// Append one item. Fails if the id is already persisted.
    fn insert_item(&mut self, item: &SyncQueueItem) -> Result<()>;

    /// Overwrite the payload and failure history of a persisted item.
    ///
    /// Returns false when the item is no longer persisted.
    fn update_item(&mut self, item: &SyncQueueItem) -> Result<bool>;

    /// Delete one item. Returns false when it was not persisted.
    fn remove_item(&mut self, id: &str) -> Result<bool>;

    /// Last version both sides agreed on, used as the merge base.
    fn load_base(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<serde_json::Value>>;

    /// Record the version both sides now agree on.
    fn save_base(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        base: &serde_json::Value,
    ) -> Result<()>;

    /// Forget the merge base (the record was deleted remotely).
    fn clear_base(&mut self, entity_type: EntityType, entity_id: &str) -> Result<()>;

    /// Overwrite the local replica of a record.
    fn save_record(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        record: &serde_json::Value,
    ) -> Result<()>;

    /// Stamp the local record as synced if it is still at `version`.
    ///
    /// Returns false when the record moved on (or is unknown), in which case
    /// it keeps its unsynced flag.
    fn mark_synced(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        version: i64,
        synced_at: i64,
    ) -> Result<bool>;

    /// Move an abandoned item out of the queue and into the dead-letter
    /// list, in one atomic write.
    fn append_dead_letter(&mut self, letter: &DeadLetter) -> Result<()>;

    /// Claim the pass lease for `holder` until `expires_at`.
    ///
    /// Succeeds when the lease is free, expired at `now`, or already held
    /// by `holder` (which renews it). Returns false while another holder
    /// has it.
    fn acquire_pass_lease(&mut self, holder: &str, now: i64, expires_at: i64) -> Result<bool>;

    /// Give the lease back. A no-op unless `holder` has it.
    fn release_pass_lease(&mut self, holder: &str) -> Result<()>;
}

/// Last successful full-sync timestamp, per scope.
pub trait WatermarkStore {
    fn watermark(&self, scope: &str) -> Result<Option<i64>>;

    fn set_watermark(&mut self, scope: &str, at: i64) -> Result<()>;
}

//! In-memory storage implementation
//!
//! Used by tests and by callers that keep their own durability. Writes can
//! be made to fail on demand to exercise the fatal-store path.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{DeadLetter, EntityType, SyncQueueItem};

use super::traits::{SyncStore, WatermarkStore};

type RecordKey = (EntityType, String);

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Vec<SyncQueueItem>,
    bases: HashMap<RecordKey, serde_json::Value>,
    records: HashMap<RecordKey, serde_json::Value>,
    dead_letters: Vec<DeadLetter>,
    watermarks: HashMap<String, i64>,
    lease: Option<(String, i64)>,
    fail_writes: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-persisted queue.
    #[must_use]
    pub fn with_items(items: Vec<SyncQueueItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Make every subsequent write return `Error::Store`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    #[must_use]
    pub fn persisted_items(&self) -> &[SyncQueueItem] {
        &self.items
    }

    #[must_use]
    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead_letters
    }

    #[must_use]
    pub fn record(&self, entity_type: EntityType, entity_id: &str) -> Option<&serde_json::Value> {
        self.records.get(&(entity_type, entity_id.to_string()))
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Store("memory store is read-only".to_string()));
        }
        Ok(())
    }
}

impl SyncStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<SyncQueueItem>> {
        Ok(self.items.clone())
    }

    fn save_all(&mut self, items: &[SyncQueueItem]) -> Result<()> {
        self.check_writable()?;
        self.items = items.to_vec();
        Ok(())
    }

    fn insert_item(&mut self, item: &SyncQueueItem) -> Result<()> {
        self.check_writable()?;
        if self.items.iter().any(|existing| existing.id == item.id) {
            return Err(Error::Store(format!("queue item {} already persisted", item.id)));
        }
        self.items.push(item.clone());
        Ok(())
    }

    fn update_item(&mut self, item: &SyncQueueItem) -> Result<bool> {
        self.check_writable()?;
        let Some(existing) = self.items.iter_mut().find(|existing| existing.id == item.id) else {
            return Ok(false);
        };
        *existing = item.clone();
        Ok(true)
    }

    fn remove_item(&mut self, id: &str) -> Result<bool> {
        self.check_writable()?;
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        Ok(self.items.len() < before)
    }

    fn load_base(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self.bases.get(&(entity_type, entity_id.to_string())).cloned())
    }

    fn save_base(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        base: &serde_json::Value,
    ) -> Result<()> {
        self.check_writable()?;
        self.bases
            .insert((entity_type, entity_id.to_string()), base.clone());
        Ok(())
    }

    fn clear_base(&mut self, entity_type: EntityType, entity_id: &str) -> Result<()> {
        self.check_writable()?;
        self.bases.remove(&(entity_type, entity_id.to_string()));
        Ok(())
    }

    fn save_record(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        record: &serde_json::Value,
    ) -> Result<()> {
        self.check_writable()?;
        self.records
            .insert((entity_type, entity_id.to_string()), record.clone());
        Ok(())
    }

    fn mark_synced(
        &mut self,
        entity_type: EntityType,
        entity_id: &str,
        version: i64,
        synced_at: i64,
    ) -> Result<bool> {
        self.check_writable()?;
        let Some(record) = self.records.get_mut(&(entity_type, entity_id.to_string())) else {
            return Ok(false);
        };
        if record.get("updated_at").and_then(serde_json::Value::as_i64) != Some(version) {
            return Ok(false);
        }
        if let Some(obj) = record.as_object_mut() {
            obj.insert("synced_at".into(), synced_at.into());
            obj.insert("unsynced_changes".into(), false.into());
        }
        Ok(true)
    }

    fn append_dead_letter(&mut self, letter: &DeadLetter) -> Result<()> {
        self.check_writable()?;
        self.items.retain(|item| item.id != letter.item.id);
        self.dead_letters.push(letter.clone());
        Ok(())
    }

    fn acquire_pass_lease(&mut self, holder: &str, now: i64, expires_at: i64) -> Result<bool> {
        self.check_writable()?;
        if let Some((owner, until)) = &self.lease {
            if owner != holder && *until > now {
                return Ok(false);
            }
        }
        self.lease = Some((holder.to_string(), expires_at));
        Ok(true)
    }

    fn release_pass_lease(&mut self, holder: &str) -> Result<()> {
        self.check_writable()?;
        if self.lease.as_ref().is_some_and(|(owner, _)| owner == holder) {
            self.lease = None;
        }
        Ok(())
    }
}

impl WatermarkStore for MemoryStore {
    fn watermark(&self, scope: &str) -> Result<Option<i64>> {
        Ok(self.watermarks.get(scope).copied())
    }

    fn set_watermark(&mut self, scope: &str, at: i64) -> Result<()> {
        self.check_writable()?;
        self.watermarks.insert(scope.to_string(), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operation;
    use serde_json::json;

    #[test]
    fn test_mark_synced_only_matching_version() {
        let mut store = MemoryStore::new();
        store
            .save_record(EntityType::Job, "job_1", &json!({"id": "job_1", "updated_at": 10}))
            .unwrap();

        assert!(!store.mark_synced(EntityType::Job, "job_1", 9, 100).unwrap());
        assert!(store.mark_synced(EntityType::Job, "job_1", 10, 100).unwrap());
        assert!(!store.mark_synced(EntityType::Job, "job_2", 10, 100).unwrap());

        let record = store.record(EntityType::Job, "job_1").unwrap();
        assert_eq!(record["synced_at"], 100);
        assert_eq!(record["unsynced_changes"], false);
    }

    #[test]
    fn test_fail_writes() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);

        let item = SyncQueueItem::new(
            "sq_1".into(),
            EntityType::Job,
            Operation::Create,
            json!({}),
            0,
        );
        assert!(matches!(store.save_all(&[item]), Err(Error::Store(_))));
        assert!(store.persisted_items().is_empty());
        assert!(store.set_watermark("jobs", 5).is_err());
        assert!(store.acquire_pass_lease("pass_a", 0, 10).is_err());
    }

    #[test]
    fn test_dead_letter_leaves_the_queue() {
        let mut store = MemoryStore::new();
        let item = SyncQueueItem::new(
            "sq_1".into(),
            EntityType::Job,
            Operation::Create,
            json!({}),
            0,
        );
        store.insert_item(&item).unwrap();
        assert!(store.insert_item(&item).is_err());

        store
            .append_dead_letter(&DeadLetter {
                item,
                reason: crate::model::DeadLetterReason::Rejected,
                error: "HTTP 400".into(),
                abandoned_at: 1,
            })
            .unwrap();
        assert!(store.persisted_items().is_empty());
        assert_eq!(store.dead_letters().len(), 1);
    }
}

//! Durable queue of pending operations.
//!
//! The store is the source of truth. Every change is written to it first,
//! one item at a time, and only then applied to the in-memory copy, so
//! several handles on one database never overwrite each other's items.
//! [`SyncQueue::refresh`] re-reads the store to pick up changes made
//! through other handles. Items are kept in FIFO order by `created_at`,
//! ties broken by insertion order.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DeadLetter, SyncQueueItem};
use crate::storage::SyncStore;

use super::retry::RetryScheduler;

pub struct SyncQueue<S: SyncStore> {
    store: S,
    items: Vec<SyncQueueItem>,
}

impl<S: SyncStore> SyncQueue<S> {
    /// Load every persisted item from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn open(store: S) -> Result<Self> {
        let mut queue = Self {
            store,
            items: Vec::new(),
        };
        queue.refresh()?;
        debug!(items = queue.items.len(), "Loaded sync queue");
        Ok(queue)
    }

    /// Replace the in-memory copy with what the store holds now.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn refresh(&mut self) -> Result<()> {
        let mut items = self.store.load_all()?;
        items.sort_by_key(|item| item.created_at);
        self.items = items;
        Ok(())
    }

    /// Seed `retry` with the failure history persisted on each item.
    pub fn restore_retry_state(&self, retry: &mut RetryScheduler) {
        for item in &self.items {
            retry.restore(&item.id, item.retry_count, item.last_attempt_at);
        }
    }

    /// Persist an item, then append it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id is already queued, or the store
    /// error if the write fails (the item is then not queued).
    pub fn enqueue(&mut self, item: SyncQueueItem) -> Result<()> {
        if self.contains(&item.id) {
            return Err(Error::InvalidArgument(format!(
                "queue item {} already exists",
                item.id
            )));
        }

        self.store.insert_item(&item)?;
        let at = self
            .items
            .partition_point(|existing| existing.created_at <= item.created_at);
        self.items.insert(at, item);
        Ok(())
    }

    /// First item that may be attempted at `now`. The item stays queued.
    #[must_use]
    pub fn dequeue_due(&self, now: i64, retry: &RetryScheduler) -> Option<&SyncQueueItem> {
        self.dequeue_due_where(now, retry, |_| true)
    }

    /// Like [`dequeue_due`](Self::dequeue_due), restricted to items accepted
    /// by `filter`.
    pub fn dequeue_due_where<F>(
        &self,
        now: i64,
        retry: &RetryScheduler,
        filter: F,
    ) -> Option<&SyncQueueItem>
    where
        F: Fn(&SyncQueueItem) -> bool,
    {
        self.items
            .iter()
            .find(|item| filter(item) && retry.is_due(&item.id, now))
    }

    /// Delete an item. Removing an unknown id is a no-op.
    ///
    /// Returns whether the store still held the item.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails; the item stays queued.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let removed = self.store.remove_item(id)?;
        self.items.retain(|item| item.id != id);
        Ok(removed)
    }

    /// Stamp a failed attempt onto the item, returning its new retry count.
    ///
    /// # Errors
    ///
    /// Returns `QueueItemNotFound` for an unknown id or one another handle
    /// removed, or the store error.
    pub fn record_failure(&mut self, id: &str, at: i64, error: &str) -> Result<u32> {
        let index = self.require(id)?;
        let mut updated = self.items[index].clone();
        updated.retry_count = updated.retry_count.saturating_add(1);
        updated.last_attempt_at = Some(at);
        updated.last_error = Some(error.to_string());
        let count = updated.retry_count;
        self.write_back(index, updated)?;
        Ok(count)
    }

    /// Swap in a new payload (after a conflict was settled).
    ///
    /// # Errors
    ///
    /// Returns `QueueItemNotFound` for an unknown id or one another handle
    /// removed, or the store error.
    pub fn replace_payload(&mut self, id: &str, payload: serde_json::Value) -> Result<()> {
        let index = self.require(id)?;
        let mut updated = self.items[index].clone();
        updated.payload = payload;
        self.write_back(index, updated)
    }

    /// Move an item to the dead-letter list.
    ///
    /// # Errors
    ///
    /// Returns the store error; the item then stays queued.
    pub fn dead_letter(&mut self, letter: &DeadLetter) -> Result<()> {
        self.store.append_dead_letter(letter)?;
        self.items.retain(|item| item.id != letter.item.id);
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pending items in upload order.
    #[must_use]
    pub fn list_pending(&self) -> &[SyncQueueItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SyncQueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Drop every persisted item, returning how many there were.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails; nothing is dropped.
    pub fn clear(&mut self) -> Result<usize> {
        self.refresh()?;
        self.store.save_all(&[])?;
        Ok(std::mem::take(&mut self.items).len())
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give the store back, e.g. after shutdown.
    pub fn into_store(self) -> S {
        self.store
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| Error::QueueItemNotFound { id: id.to_string() })
    }

    fn write_back(&mut self, index: usize, updated: SyncQueueItem) -> Result<()> {
        if !self.store.update_item(&updated)? {
            self.items.remove(index);
            return Err(Error::QueueItemNotFound { id: updated.id });
        }
        self.items[index] = updated;
        Ok(())
    }
}

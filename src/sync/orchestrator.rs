//! Sync pass driver.
//!
//! A pass snapshots the ids pending when it starts, then repeatedly takes
//! the first due item of that snapshot it has not visited yet and uploads
//! it as a one-item batch. Per item:
//!
//! ```text
//! Pending -> Uploading -> Synced
//!                      -> Failed -> Pending (retry budget left)
//!                      -> Abandoned (budget exhausted, or rejected)
//!                      -> Conflict -> Pending (local or merged) | Synced (remote won)
//! ```
//!
//! The queue and retry state sit behind one mutex that is never held across
//! the upload await, so callers may enqueue while a pass runs. Items added
//! mid-pass wait for the next pass. Only store failures abort a pass; every
//! per-item failure ends up in the [`PassReport`].
//!
//! Other handles (usually other processes) may share the store. The queue
//! is re-read before every selection, and a pass holds the store's pass
//! lease, renewed before each upload, so two passes never upload the same
//! item.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    ConflictResolution, DeadLetter, DeadLetterReason, EntityType, Job, Operation, RecordHeader,
    ResolutionStrategy, SyncQueueItem,
};
use crate::storage::SyncStore;

use super::clock::{uuid_ids, Clock, IdGenerator, SystemClock};
use super::conflict::{ConflictDetector, Divergence};
use super::events::{EventSink, SyncEvent, TracingSink};
use super::merge::{resolve_by_timestamp, MergeResolver};
use super::queue::SyncQueue;
use super::retry::{RetryPolicy, RetryScheduler, RetryState};
use super::upload::{UploadOutcome, Uploader};

/// Most per-item errors kept in one report.
pub const MAX_REPORTED_ERRORS: usize = 50;

/// How long a pass lease lasts without renewal.
pub const PASS_LEASE_MS: i64 = 5 * 60 * 1000;

/// One abandoned item, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassError {
    pub item_id: String,
    pub message: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    /// Items the remote store accepted.
    pub synced: usize,
    /// Upload attempts that failed, including those that were abandoned.
    pub failed: usize,
    /// Conflicts reconciled.
    pub conflicts: usize,
    /// Why each abandoned item failed, at most [`MAX_REPORTED_ERRORS`].
    /// Transient failures that keep their retry budget are not listed.
    pub errors: Vec<PassError>,
    /// Abandoned items beyond the reporting limit.
    pub dropped_errors: usize,
    /// Items moved to the dead-letter list during this pass.
    pub abandoned: Vec<DeadLetter>,
    /// The pass stopped early because it was cancelled.
    pub cancelled: bool,
}

impl PassReport {
    fn push_error(&mut self, item_id: &str, message: &str) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(PassError {
                item_id: item_id.to_string(),
                message: message.to_string(),
            });
        } else {
            self.dropped_errors += 1;
        }
    }

    /// Number of items visited.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.synced + self.failed + self.conflicts
    }
}

/// Cooperative cancellation for a running pass.
///
/// Checked before each upload; an upload already in flight completes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Held for the duration of a pass: the in-process flag plus the store's
/// pass lease. Both are released on drop.
struct PassGuard<'a, S: SyncStore, U: Uploader> {
    engine: &'a SyncOrchestrator<S, U>,
}

impl<'a, S: SyncStore, U: Uploader> PassGuard<'a, S, U> {
    fn acquire(engine: &'a SyncOrchestrator<S, U>) -> Result<Self> {
        engine
            .in_pass
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::PassInProgress)?;

        match engine.claim_lease() {
            Ok(true) => Ok(Self { engine }),
            Ok(false) => {
                engine.in_pass.store(false, Ordering::SeqCst);
                Err(Error::PassInProgress)
            }
            Err(e) => {
                engine.in_pass.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

impl<S: SyncStore, U: Uploader> Drop for PassGuard<'_, S, U> {
    fn drop(&mut self) {
        let holder = &self.engine.holder;
        let released = self
            .engine
            .lock()
            .and_then(|mut state| state.queue.store_mut().release_pass_lease(holder));
        if let Err(e) = released {
            warn!(error = %e, "Failed to release pass lease");
        }
        self.engine.in_pass.store(false, Ordering::SeqCst);
    }
}

struct EngineState<S: SyncStore> {
    queue: SyncQueue<S>,
    retry: RetryScheduler,
}

impl<S: SyncStore> EngineState<S> {
    /// Re-read the queue and rebuild retry state from it.
    fn refresh(&mut self) -> Result<()> {
        self.queue.refresh()?;
        self.retry.clear();
        self.queue.restore_retry_state(&mut self.retry);
        Ok(())
    }
}

/// How a conflict was settled, before it is applied.
enum Settlement {
    /// Local wins: resend the local payload on top of this remote version.
    Keep(serde_json::Value),
    TakeRemote(serde_json::Value),
    Replace {
        merged: serde_json::Value,
        remote: serde_json::Value,
    },
}

/// Drives sync passes over one queue.
pub struct SyncOrchestrator<S: SyncStore, U: Uploader> {
    state: Mutex<EngineState<S>>,
    uploader: U,
    clock: Box<dyn Clock>,
    sink: Box<dyn EventSink>,
    ids: IdGenerator,
    detector: ConflictDetector,
    merger: MergeResolver,
    in_pass: AtomicBool,
    holder: String,
}

impl<S: SyncStore, U: Uploader> SyncOrchestrator<S, U> {
    /// Load the queue from `store` and rebuild retry state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn open(store: S, uploader: U, policy: RetryPolicy) -> Result<Self> {
        let queue = SyncQueue::open(store)?;
        let mut retry = RetryScheduler::new(policy);
        queue.restore_retry_state(&mut retry);
        info!(pending = queue.size(), "Sync engine started");

        Ok(Self {
            state: Mutex::new(EngineState { queue, retry }),
            uploader,
            clock: Box::new(SystemClock),
            sink: Box::new(TracingSink),
            ids: uuid_ids(),
            detector: ConflictDetector::new(),
            merger: MergeResolver::new(),
            in_pass: AtomicBool::new(false),
            holder: format!("pass_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// Durably queue an operation and return its id.
    ///
    /// # Errors
    ///
    /// Returns the store error if the queue cannot be persisted.
    pub fn enqueue(
        &self,
        entity_type: EntityType,
        operation: Operation,
        payload: serde_json::Value,
    ) -> Result<String> {
        let id = (self.ids)();
        let now = self.clock.now_ms();
        let item = SyncQueueItem::new(id.clone(), entity_type, operation, payload, now);

        let size = {
            let mut state = self.lock()?;
            state.queue.enqueue(item)?;
            state.queue.size()
        };

        debug!(item_id = %id, entity_type = %entity_type, operation = %operation, "Enqueued");
        self.sink.emit(&SyncEvent::Enqueued {
            item_id: id.clone(),
            entity_type,
            operation,
        });
        self.sink.emit(&SyncEvent::QueueSize { size });
        Ok(id)
    }

    /// Put a dead letter back on the queue with a clean retry history.
    ///
    /// # Errors
    ///
    /// Returns the store error if the queue cannot be persisted.
    pub fn requeue(&self, letter: DeadLetter) -> Result<String> {
        let mut item = letter.item;
        item.retry_count = 0;
        item.last_attempt_at = None;
        item.last_error = None;
        let id = item.id.clone();

        let size = {
            let mut state = self.lock()?;
            state.retry.reset(&id);
            state.queue.enqueue(item)?;
            state.queue.size()
        };
        self.sink.emit(&SyncEvent::QueueSize { size });
        Ok(id)
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns `PassInProgress` if another pass is running, or a store
    /// error that aborted this one.
    pub async fn run_pass(&self) -> Result<PassReport> {
        self.run_pass_with_cancel(&CancelFlag::new()).await
    }

    /// Run one pass, stopping before the next upload once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns `PassInProgress` if another pass is running, or a store
    /// error that aborted this one.
    pub async fn run_pass_with_cancel(&self, cancel: &CancelFlag) -> Result<PassReport> {
        let _guard = PassGuard::acquire(self)?;
        let started_at = self.clock.now_ms();

        let snapshot: HashSet<String> = {
            let state = self.lock_fresh()?;
            state.queue.list_pending().iter().map(|i| i.id.clone()).collect()
        };
        debug!(pending = snapshot.len(), "Sync pass started");

        let mut visited: HashSet<String> = HashSet::new();
        let mut report = PassReport::default();

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            if !self.claim_lease()? {
                warn!("Pass lease taken over by another process, stopping");
                report.cancelled = true;
                break;
            }

            let next = {
                let state = self.lock_fresh()?;
                state
                    .queue
                    .dequeue_due_where(started_at, &state.retry, |item| {
                        snapshot.contains(&item.id) && !visited.contains(&item.id)
                    })
                    .cloned()
            };
            let Some(item) = next else {
                break;
            };
            visited.insert(item.id.clone());

            debug!(item_id = %item.id, entity_type = %item.entity_type, "Uploading");
            let outcome = self.uploader.upload(std::slice::from_ref(&item)).await;
            self.apply_outcome(&item, outcome, &mut report)?;
        }

        let size = self.lock()?.queue.size();
        self.sink.emit(&SyncEvent::QueueSize { size });
        self.sink.emit(&SyncEvent::PassCompleted {
            synced: report.synced,
            failed: report.failed,
            conflicts: report.conflicts,
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    fn apply_outcome(
        &self,
        item: &SyncQueueItem,
        outcome: UploadOutcome,
        report: &mut PassReport,
    ) -> Result<()> {
        let applied = match outcome {
            UploadOutcome::Accepted => self.on_accepted(item, report),
            UploadOutcome::Transient(reason) => self.on_failure(item, &reason, false, report),
            UploadOutcome::Permanent(reason) => self.on_failure(item, &reason, true, report),
            UploadOutcome::Conflict { remote } => self.on_conflict(item, remote, report),
        };

        match applied {
            Err(Error::QueueItemNotFound { id }) if id == item.id => {
                debug!(item_id = %item.id, "Item left the queue during upload");
                self.lock()?.retry.reset(&item.id);
                Ok(())
            }
            other => other,
        }
    }

    fn on_accepted(&self, item: &SyncQueueItem, report: &mut PassReport) -> Result<()> {
        let now = self.clock.now_ms();
        {
            let mut state = self.lock()?;
            if let Some(entity_id) = item.entity_id.as_deref() {
                let store = state.queue.store_mut();
                if item.operation == Operation::Delete {
                    store.clear_base(item.entity_type, entity_id)?;
                } else {
                    store.save_base(item.entity_type, entity_id, &item.payload)?;
                    let version = item.payload.get("updated_at");
                    if let Some(version) = version.and_then(serde_json::Value::as_i64) {
                        store.mark_synced(item.entity_type, entity_id, version, now)?;
                    }
                }
            }
            state.queue.remove(&item.id)?;
            state.retry.reset(&item.id);
        }

        report.synced += 1;
        self.sink.emit(&SyncEvent::Synced {
            item_id: item.id.clone(),
        });
        Ok(())
    }

    fn on_failure(
        &self,
        item: &SyncQueueItem,
        reason: &str,
        permanent: bool,
        report: &mut PassReport,
    ) -> Result<()> {
        let now = self.clock.now_ms();

        let event = {
            let mut state = self.lock()?;
            state.queue.record_failure(&item.id, now, reason)?;
            let attempts = state.retry.record_attempt(&item.id, now);

            if permanent || !state.retry.should_retry(&item.id) {
                let dead_reason = if permanent {
                    DeadLetterReason::Rejected
                } else {
                    DeadLetterReason::Exhausted
                };
                let letter = Self::abandon(&mut state, &item.id, dead_reason, reason, now)?;
                report.push_error(&item.id, reason);
                report.abandoned.push(letter);
                SyncEvent::Abandoned {
                    item_id: item.id.clone(),
                    reason: dead_reason,
                    attempts,
                    error: reason.to_string(),
                }
            } else {
                SyncEvent::Failed {
                    item_id: item.id.clone(),
                    attempts,
                    next_eligible_at: state.retry.next_eligible_at(&item.id),
                    error: reason.to_string(),
                }
            }
        };

        report.failed += 1;
        self.sink.emit(&event);
        Ok(())
    }

    /// Move an item from the queue to the dead-letter store.
    fn abandon(
        state: &mut MutexGuard<'_, EngineState<S>>,
        item_id: &str,
        reason: DeadLetterReason,
        error: &str,
        now: i64,
    ) -> Result<DeadLetter> {
        let item = state
            .queue
            .get(item_id)
            .cloned()
            .ok_or_else(|| Error::QueueItemNotFound {
                id: item_id.to_string(),
            })?;

        let letter = DeadLetter {
            item,
            reason,
            error: error.to_string(),
            abandoned_at: now,
        };
        state.queue.dead_letter(&letter)?;
        state.retry.reset(item_id);
        Ok(letter)
    }

    fn on_conflict(
        &self,
        item: &SyncQueueItem,
        remote: serde_json::Value,
        report: &mut PassReport,
    ) -> Result<()> {
        let Some(entity_id) = item.entity_id.clone() else {
            let reason = "conflict reported for a payload without an id";
            return self.on_failure(item, reason, true, report);
        };

        // The local version is already based on this remote version, so the
        // remote refused it again. Spend retry budget instead of resending.
        if let Some(version) = rebased_on(&item.payload, &remote) {
            let reason = format!("remote refused local version based on {version}");
            return self.on_failure(item, &reason, false, report);
        }

        let settled = match item.entity_type {
            EntityType::Job => self.settle_job(item, &entity_id, remote),
            EntityType::Node | EntityType::Route => {
                Ok(Self::settle_by_timestamp(self.detector, item, remote))
            }
        };
        let (strategy, settlement) = match settled? {
            Ok(settled) => settled,
            Err(reason) => return self.on_failure(item, &reason, false, report),
        };

        let now = self.clock.now_ms();
        {
            let mut state = self.lock()?;
            match settlement {
                Settlement::Keep(remote) => {
                    let rebased = rebase(item.payload.clone(), &remote);
                    let store = state.queue.store_mut();
                    store.save_base(item.entity_type, &entity_id, &remote)?;
                    state.queue.replace_payload(&item.id, rebased)?;
                }
                Settlement::TakeRemote(remote) => {
                    let record = stamp_synced(remote.clone(), now);
                    let store = state.queue.store_mut();
                    store.save_base(item.entity_type, &entity_id, &remote)?;
                    store.save_record(item.entity_type, &entity_id, &record)?;
                    state.queue.remove(&item.id)?;
                    state.retry.reset(&item.id);
                }
                Settlement::Replace { merged, remote } => {
                    let store = state.queue.store_mut();
                    store.save_base(item.entity_type, &entity_id, &remote)?;
                    store.save_record(item.entity_type, &entity_id, &merged)?;
                    state.queue.replace_payload(&item.id, merged)?;
                }
            }
        }

        report.conflicts += 1;
        info!(
            item_id = %item.id,
            entity_id = %entity_id,
            strategy = %strategy,
            "Conflict resolved"
        );
        self.sink.emit(&SyncEvent::ConflictResolved(ConflictResolution {
            strategy,
            timestamp: now,
            entity_type: item.entity_type,
            entity_id,
            queue_item_id: item.id.clone(),
        }));
        Ok(())
    }

    /// Three-way merge for jobs.
    ///
    /// The outer `Result` carries store failures; the inner `Err` is a
    /// reason to treat the attempt as a transient failure.
    fn settle_job(
        &self,
        item: &SyncQueueItem,
        entity_id: &str,
        remote: serde_json::Value,
    ) -> Result<std::result::Result<(ResolutionStrategy, Settlement), String>> {
        let local = match Job::from_value(&item.payload) {
            Ok(job) => job,
            Err(e) => return Ok(Err(format!("local payload is not a job: {e}"))),
        };
        let remote_job = match Job::from_value(&remote) {
            Ok(job) => job,
            Err(e) => return Ok(Err(format!("remote version is not a job: {e}"))),
        };

        let base = self
            .lock()?
            .queue
            .store()
            .load_base(EntityType::Job, entity_id)?
            .and_then(|b| Job::from_value(&b).ok())
            .unwrap_or_else(|| Job::empty(entity_id));

        let settled = match self.detector.classify(&local, &remote_job) {
            Divergence::Both => {
                let (merged, strategy) =
                    self.merger.merge_with_strategy(&local, &remote_job, &base);
                match strategy {
                    ResolutionStrategy::Local => (strategy, Settlement::Keep(remote)),
                    ResolutionStrategy::Remote => (strategy, Settlement::TakeRemote(remote)),
                    ResolutionStrategy::Merge => (
                        strategy,
                        Settlement::Replace {
                            merged: merged.to_value()?,
                            remote,
                        },
                    ),
                }
            }
            Divergence::LocalOnly => (ResolutionStrategy::Local, Settlement::Keep(remote)),
            Divergence::RemoteOnly | Divergence::None => {
                (ResolutionStrategy::Remote, Settlement::TakeRemote(remote))
            }
        };
        Ok(Ok(settled))
    }

    /// Whole-record resolution for entity types without merge rules.
    fn settle_by_timestamp(
        detector: ConflictDetector,
        item: &SyncQueueItem,
        remote: serde_json::Value,
    ) -> std::result::Result<(ResolutionStrategy, Settlement), String> {
        let local = RecordHeader::from_value(&item.payload)
            .ok_or_else(|| "local payload has no version header".to_string())?;
        let remote_header = RecordHeader::from_value(&remote)
            .ok_or_else(|| "remote version has no version header".to_string())?;

        let strategy = match detector.classify(&local, &remote_header) {
            Divergence::Both => resolve_by_timestamp(&local, &remote_header),
            Divergence::LocalOnly => ResolutionStrategy::Local,
            Divergence::RemoteOnly | Divergence::None => ResolutionStrategy::Remote,
        };

        Ok(match strategy {
            ResolutionStrategy::Remote => (strategy, Settlement::TakeRemote(remote)),
            ResolutionStrategy::Local | ResolutionStrategy::Merge => {
                (strategy, Settlement::Keep(remote))
            }
        })
    }

    // ==================
    // Inspection
    // ==================

    /// Snapshot of pending items in upload order, as the store holds them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn pending(&self) -> Result<Vec<SyncQueueItem>> {
        Ok(self.lock_fresh()?.queue.list_pending().to_vec())
    }

    /// Number of pending items.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn size(&self) -> Result<usize> {
        Ok(self.lock_fresh()?.queue.size())
    }

    /// Backoff state for one item, if it has failed before.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn retry_state(&self, item_id: &str) -> Result<Option<RetryState>> {
        Ok(self.lock_fresh()?.retry.state(item_id))
    }

    /// Earliest time a failed item may be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn next_eligible_at(&self, item_id: &str) -> Result<Option<i64>> {
        Ok(self.lock_fresh()?.retry.next_eligible_at(item_id))
    }

    /// Drop one pending item.
    ///
    /// # Errors
    ///
    /// Returns `QueueItemNotFound` for an unknown id, or the store error.
    pub fn remove(&self, item_id: &str) -> Result<()> {
        let size = {
            let mut state = self.lock()?;
            if !state.queue.remove(item_id)? {
                return Err(Error::QueueItemNotFound {
                    id: item_id.to_string(),
                });
            }
            state.retry.reset(item_id);
            state.queue.size()
        };
        self.sink.emit(&SyncEvent::QueueSize { size });
        Ok(())
    }

    /// Drop every pending item and its retry state, returning how many
    /// were dropped.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub fn clear(&self) -> Result<usize> {
        let dropped = {
            let mut state = self.lock()?;
            let dropped = state.queue.clear()?;
            state.retry.clear();
            dropped
        };
        self.sink.emit(&SyncEvent::QueueSize { size: 0 });
        Ok(dropped)
    }

    /// Run `f` against the store while holding the engine lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine state is poisoned.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut state = self.lock()?;
        Ok(f(state.queue.store_mut()))
    }

    /// Stop the engine and hand back the store.
    ///
    /// Every change is already persisted, so nothing is written here.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine state is poisoned.
    pub fn shutdown(self) -> Result<S> {
        let state = self
            .state
            .into_inner()
            .map_err(|_| Error::Other("sync engine state poisoned".to_string()))?;
        info!(pending = state.queue.size(), "Sync engine stopped");
        Ok(state.queue.into_store())
    }

    /// Claim or renew the store's pass lease.
    fn claim_lease(&self) -> Result<bool> {
        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(PASS_LEASE_MS);
        self.lock()?
            .queue
            .store_mut()
            .acquire_pass_lease(&self.holder, now, expires_at)
    }

    /// Lock the engine state after re-reading it from the store.
    fn lock_fresh(&self) -> Result<MutexGuard<'_, EngineState<S>>> {
        let mut state = self.lock()?;
        state.refresh()?;
        Ok(state)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState<S>>> {
        self.state
            .lock()
            .map_err(|_| Error::Other("sync engine state poisoned".to_string()))
    }
}

/// Remote version a local payload was already rebased on, when it matches
/// `remote`.
fn rebased_on(payload: &serde_json::Value, remote: &serde_json::Value) -> Option<i64> {
    let remote_version = RecordHeader::from_value(remote)?.updated_at;
    let based_on = payload.get("synced_at").and_then(serde_json::Value::as_i64)?;
    (based_on == remote_version).then_some(remote_version)
}

/// Base a local payload on `remote`, so the next upload overrides it.
fn rebase(mut payload: serde_json::Value, remote: &serde_json::Value) -> serde_json::Value {
    let Some(version) = RecordHeader::from_value(remote).map(|h| h.updated_at) else {
        return payload;
    };
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("synced_at".into(), version.into());
    }
    payload
}

/// Mark a remote version as the synced local copy.
fn stamp_synced(mut record: serde_json::Value, at: i64) -> serde_json::Value {
    if let Some(obj) = record.as_object_mut() {
        obj.insert("synced_at".into(), at.into());
        obj.insert("unsynced_changes".into(), false.into());
    }
    record
}

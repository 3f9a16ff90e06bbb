//! Offline synchronization engine.
//!
//! Pending operations are captured in a durable [`SyncQueue`], pushed by a
//! [`SyncOrchestrator`] pass through an [`Uploader`], retried with
//! exponential backoff by the [`RetryScheduler`], and reconciled with the
//! remote copy through [`ConflictDetector`] and [`MergeResolver`] when both
//! sides changed.
//!
//! # Example
//!
//! ```ignore
//! use fieldsync::storage::SqliteStorage;
//! use fieldsync::sync::{HttpUploader, RetryPolicy, SyncOrchestrator};
//!
//! let engine = SyncOrchestrator::open(storage, uploader, RetryPolicy::default())?;
//! engine.enqueue(EntityType::Job, Operation::Update, payload)?;
//!
//! let report = engine.run_pass().await?;
//! println!("{} synced, {} failed", report.synced, report.failed);
//! ```

pub mod clock;
pub mod conflict;
pub mod delta;
pub mod events;
pub mod export;
pub mod file;
pub mod hash;
pub mod merge;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod upload;

pub use clock::{sequential_ids, uuid_ids, Clock, IdGenerator, ManualClock, SystemClock};
pub use conflict::{ConflictDetector, Divergence};
pub use delta::select_changed_since;
pub use events::{CollectingSink, EventSink, FanoutSink, NullSink, SyncEvent, TracingSink};
pub use export::{
    default_export_path, export_dead_letters, read_dead_letter_export, DeadLetterRecord,
};
pub use file::{atomic_write, read_jsonl, write_jsonl};
pub use hash::content_hash;
pub use merge::{diff_jobs, resolve_by_timestamp, structurally_equal, MergeResolver};
pub use orchestrator::{
    CancelFlag, PassError, PassReport, SyncOrchestrator, MAX_REPORTED_ERRORS, PASS_LEASE_MS,
};
pub use queue::SyncQueue;
pub use retry::{RetryPolicy, RetryScheduler, RetryState};
pub use upload::{
    classify_response, HttpUploader, OfflineUploader, UploadConfig, UploadOutcome, Uploader,
};

//! Data models for fieldsync.
//!
//! This module contains all domain models:
//! - SyncQueueItem / DeadLetter (pending and abandoned operations)
//! - Job (the mergeable work-order record)
//! - RecordHeader (version header of any record)
//! - ConflictResolution (audit entry)

pub mod job;
pub mod queue_item;
pub mod record;
pub mod resolution;

pub use job::{InlineNote, Job};
pub use queue_item::{DeadLetter, DeadLetterReason, EntityType, Operation, SyncQueueItem};
pub use record::{RecordHeader, Syncable};
pub use resolution::{ConflictResolution, ResolutionStrategy};

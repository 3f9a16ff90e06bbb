//! Persistence layer for fieldsync.
//!
//! The engine talks to storage only through the traits in [`traits`].
//! Two providers ship with the crate:
//! - SQLite with WAL mode, immediate transactions and an audit table
//! - an in-memory store for tests
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage and the audit event sink
//! - [`memory`] - In-memory provider
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - SQLite provider
//! - [`traits`] - `SyncStore` and `WatermarkStore`

pub mod events;
pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use events::AuditLog;
pub use memory::MemoryStore;
pub use sqlite::{MutationContext, SqliteStorage, StoredRecord};
pub use traits::{SyncStore, WatermarkStore};

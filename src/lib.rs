//! fieldsync - offline-first sync engine for field technician devices
//!
//! This crate provides the queue, retry, conflict and merge machinery behind
//! the `fieldsync` CLI.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (SyncQueueItem, DeadLetter, Job, RecordHeader)
//! - [`storage`] - SQLite persistence, in-memory store and audit log
//! - [`sync`] - Queue, retry scheduler, conflict detection, merge and orchestration
//! - [`config`] - Paths and settings
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};

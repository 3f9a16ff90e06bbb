//! Error types for fieldsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 6=sync, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Individual upload failures never surface here: the orchestrator absorbs
//! them into a pass report. These variants describe failures of the engine's
//! own infrastructure (store, configuration, input).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fieldsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    StoreError,

    // Not Found (exit 3)
    QueueItemNotFound,
    DeadLetterNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidPayload,

    // Sync (exit 6)
    PassInProgress,
    UploadError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::StoreError => "STORE_ERROR",
            Self::QueueItemNotFound => "QUEUE_ITEM_NOT_FOUND",
            Self::DeadLetterNotFound => "DEAD_LETTER_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::PassInProgress => "PASS_IN_PROGRESS",
            Self::UploadError => "UPLOAD_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::StoreError => 2,
            Self::QueueItemNotFound | Self::DeadLetterNotFound => 3,
            Self::InvalidArgument | Self::InvalidPayload => 4,
            Self::PassInProgress | Self::UploadError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller should simply try again later.
    ///
    /// True for lock contention (a pass already running, busy database)
    /// and upload adapter failures. False for bad input or missing items.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PassInProgress | Self::DatabaseError | Self::UploadError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in fieldsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `fieldsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Queue item not found: {id}")]
    QueueItemNotFound { id: String },

    #[error("Dead-letter entry not found: {id}")]
    DeadLetterNotFound { id: String },

    #[error("A sync pass is already running")]
    PassInProgress,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upload client error: {0}")]
    Upload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Store(_) => ErrorCode::StoreError,
            Self::QueueItemNotFound { .. } => ErrorCode::QueueItemNotFound,
            Self::DeadLetterNotFound { .. } => ErrorCode::DeadLetterNotFound,
            Self::PassInProgress => ErrorCode::PassInProgress,
            Self::Upload(_) => ErrorCode::UploadError,
            Self::InvalidPayload(_) => ErrorCode::InvalidPayload,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `fieldsync init` to create the local database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::QueueItemNotFound { id } => Some(format!(
                "No pending operation with ID '{id}'. Use `fieldsync queue list` to see the queue."
            )),

            Self::DeadLetterNotFound { id } => Some(format!(
                "No dead-letter entry with ID '{id}'. Use `fieldsync dead-letter list` to see them."
            )),

            Self::PassInProgress => Some(
                "Another push is still running against this queue. Wait for it to finish."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) => {
                if msg.contains("entity type") {
                    Some("Valid entity types: job, node, route".to_string())
                } else if msg.contains("operation") {
                    Some("Valid operations: create, update, delete".to_string())
                } else {
                    None
                }
            }

            Self::Config(_) => Some(
                "Check ~/.fieldsync/config.json or the FIELDSYNC_* environment variables"
                    .to_string(),
            ),

            Self::Database(_)
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidPayload(_)
            | Self::Upload(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

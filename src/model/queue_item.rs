//! Queue item model.
//!
//! A `SyncQueueItem` is one pending create/update/delete of a record,
//! captured at enqueue time and held until the remote store accepts it or
//! the retry budget runs out.

use serde::{Deserialize, Serialize};

/// Kind of record carried by a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A work order assigned to a technician.
    Job,
    /// A network node (cabinet, pole, splice point).
    Node,
    /// A planned route through a set of nodes.
    Route,
}

impl EntityType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Node => "node",
            Self::Route => "route",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "job" | "jobs" => Ok(Self::Job),
            "node" | "nodes" => Ok(Self::Node),
            "route" | "routes" => Ok(Self::Route),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// The mutation a queue item replays against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" | "insert" => Ok(Self::Create),
            "update" | "edit" => Ok(Self::Update),
            "delete" | "remove" => Ok(Self::Delete),
            _ => Err(format!("Unknown operation: {s}")),
        }
    }
}

/// A pending operation awaiting upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Unique identifier assigned at enqueue time.
    pub id: String,

    /// Kind of record being synchronized.
    pub entity_type: EntityType,

    /// Id of the record inside `payload`, when the payload has one.
    pub entity_id: Option<String>,

    /// Mutation to replay remotely.
    pub operation: Operation,

    /// Snapshot of the record at enqueue time.
    pub payload: serde_json::Value,

    /// Enqueue timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Number of upload attempts that failed.
    pub retry_count: u32,

    /// Time of the most recent failed attempt (Unix milliseconds)
    pub last_attempt_at: Option<i64>,

    /// Reason given for the most recent failure.
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Create a fresh item with no attempts recorded.
    #[must_use]
    pub fn new(
        id: String,
        entity_type: EntityType,
        operation: Operation,
        payload: serde_json::Value,
        created_at: i64,
    ) -> Self {
        let entity_id = payload
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        Self {
            id,
            entity_type,
            entity_id,
            operation,
            payload,
            created_at,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }
}

/// Why an item left the queue without being accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// The retry budget ran out on transient failures.
    Exhausted,
    /// The remote store rejected the payload outright.
    Rejected,
}

impl DeadLetterReason {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s {
            "rejected" => Self::Rejected,
            _ => Self::Exhausted,
        }
    }
}

/// A permanently failed item, kept so technician work is never lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The item as it stood when it was abandoned.
    #[serde(flatten)]
    pub item: SyncQueueItem,

    /// Why it was abandoned.
    pub reason: DeadLetterReason,

    /// Human-readable failure message.
    pub error: String,

    /// When it was abandoned (Unix milliseconds)
    pub abandoned_at: i64,
}

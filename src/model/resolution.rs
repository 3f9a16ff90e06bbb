//! Conflict resolution audit record.

use serde::{Deserialize, Serialize};

use super::queue_item::EntityType;

/// Which side a conflict was settled in favour of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    Local,
    Remote,
    Merge,
}

impl ResolutionStrategy {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one conflict was settled.
///
/// Purely an audit artifact; the reconciled record itself is what gets
/// stored and uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub strategy: ResolutionStrategy,
    pub timestamp: i64,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub queue_item_id: String,
}

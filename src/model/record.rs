//! Version metadata shared by every synchronized record.

use serde::{Deserialize, Serialize};

/// A record whose version can be compared against a sync point.
///
/// Only `synced_at` and `unsynced_changes` are owned by the sync engine;
/// everything else on an implementing type belongs to upstream logic.
pub trait Syncable {
    /// Last local modification time (Unix milliseconds).
    fn updated_at(&self) -> i64;

    /// Last time this exact version was confirmed synced, if ever.
    fn synced_at(&self) -> Option<i64>;
}

/// Version header readable from any payload, whatever its entity type.
///
/// Nodes and routes carry no field-level merge rules, so the engine only
/// ever needs their id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub id: String,
    pub updated_at: i64,
    #[serde(default)]
    pub synced_at: Option<i64>,
}

impl RecordHeader {
    /// Read the header fields out of a JSON payload.
    ///
    /// Returns `None` when `id` or `updated_at` is missing or mistyped.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl Syncable for RecordHeader {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn synced_at(&self) -> Option<i64> {
        self.synced_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_from_value() {
        let header =
            RecordHeader::from_value(&json!({"id": "node_1", "updated_at": 50, "label": "x"}))
                .unwrap();
        assert_eq!(header.id, "node_1");
        assert_eq!(header.updated_at, 50);
        assert!(header.synced_at.is_none());
    }

    #[test]
    fn test_header_requires_updated_at() {
        assert!(RecordHeader::from_value(&json!({"id": "node_1"})).is_none());
    }
}

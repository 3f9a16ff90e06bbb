//! Dead-letter export.
//!
//! Abandoned operations are written out as JSONL, one item per line, so a
//! technician's unsynced work can be handed to support or replayed later.
//! The file is a snapshot: each export overwrites the previous one.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::DeadLetter;
use crate::sync::file::{read_jsonl, write_jsonl};
use crate::sync::hash::content_hash;

/// One exported line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    #[serde(flatten)]
    pub letter: DeadLetter,
    /// Hash of the item payload.
    pub content_hash: String,
    /// RFC 3339 export time.
    pub exported_at: String,
}

impl DeadLetterRecord {
    #[must_use]
    pub fn new(letter: DeadLetter, exported_at: &str) -> Self {
        let content_hash = content_hash(&letter.item.payload);
        Self {
            letter,
            content_hash,
            exported_at: exported_at.to_string(),
        }
    }
}

/// Write `letters` to `path`, returning how many were written.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn export_dead_letters(path: &Path, letters: &[DeadLetter]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let records: Vec<DeadLetterRecord> = letters
        .iter()
        .cloned()
        .map(|letter| DeadLetterRecord::new(letter, &now))
        .collect();
    write_jsonl(path, &records)?;
    Ok(records.len())
}

/// Read back an export.
///
/// # Errors
///
/// Returns an error if the file is missing or a line does not parse.
pub fn read_dead_letter_export(path: &Path) -> Result<Vec<DeadLetterRecord>> {
    read_jsonl(path)
}

/// Default export location: `dead_letters.jsonl` next to the database.
#[must_use]
pub fn default_export_path(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        .join("dead_letters.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeadLetterReason, EntityType, Operation, SyncQueueItem};
    use serde_json::json;
    use tempfile::TempDir;

    fn letter(id: &str) -> DeadLetter {
        let mut item = SyncQueueItem::new(
            id.to_string(),
            EntityType::Job,
            Operation::Update,
            json!({"id": "job_1", "status": "Done", "updated_at": 7}),
            1,
        );
        item.retry_count = 3;
        DeadLetter {
            item,
            reason: DeadLetterReason::Exhausted,
            error: "HTTP 503".into(),
            abandoned_at: 3_000,
        }
    }

    #[test]
    fn test_export_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dead_letters.jsonl");

        let written = export_dead_letters(&path, &[letter("sq_1"), letter("sq_2")]).unwrap();
        assert_eq!(written, 2);

        let records = read_dead_letter_export(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].letter, letter("sq_1"));
        assert_eq!(records[0].content_hash, records[1].content_hash);
    }

    #[test]
    fn test_export_line_is_flat() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        export_dead_letters(&path, &[letter("sq_1")]).unwrap();

        let line = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["id"], "sq_1");
        assert_eq!(value["reason"], "exhausted");
        assert_eq!(value["retry_count"], 3);
    }

    #[test]
    fn test_default_export_path() {
        let path = default_export_path(Path::new("/home/tech/.fieldsync/data/fieldsync.db"));
        assert_eq!(path, PathBuf::from("/home/tech/.fieldsync/data/dead_letters.jsonl"));
    }
}

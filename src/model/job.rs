//! Job model.
//!
//! A job is the work order a field technician carries offline. It is the
//! one entity type with field-level merge rules: status, notes and duration
//! capture in-progress field work, and inline notes are append-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::Syncable;

/// A note attached to a job, keyed by a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineNote {
    /// Stable identifier, unique within the job.
    pub id: String,

    /// Who wrote the note.
    #[serde(default)]
    pub author: Option<String>,

    /// Note text.
    pub body: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl InlineNote {
    /// Create a note with no author.
    pub fn new(id: &str, body: &str, created_at: i64) -> Self {
        Self {
            id: id.to_string(),
            author: None,
            body: body.to_string(),
            created_at,
        }
    }
}

/// A work order synchronized between device and server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier
    pub id: String,

    /// Short description of the work
    #[serde(default)]
    pub title: String,

    /// Workflow status (e.g. "Scheduled", "In Progress", "Done")
    #[serde(default)]
    pub status: String,

    /// Free-text summary written by the technician
    #[serde(default)]
    pub notes: Option<String>,

    /// Time spent on site, in minutes
    #[serde(default)]
    pub duration_minutes: Option<u32>,

    /// Technician the job is assigned to
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Network node the job is performed at
    #[serde(default)]
    pub node_id: Option<String>,

    /// Planned visit time (Unix milliseconds)
    #[serde(default)]
    pub scheduled_for: Option<i64>,

    /// Append-only notes keyed by note id
    #[serde(default)]
    pub inline_notes: Vec<InlineNote>,

    /// Last local modification (Unix milliseconds)
    pub updated_at: i64,

    /// Last confirmed sync of this version (Unix milliseconds)
    #[serde(default)]
    pub synced_at: Option<i64>,

    /// True while local state diverges from the last synced version
    #[serde(default)]
    pub unsynced_changes: bool,

    /// Upstream-owned fields carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Job {
    /// Create a new, never-synced job.
    pub fn new(id: &str, title: &str, updated_at: i64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            status: "Scheduled".to_string(),
            notes: None,
            duration_minutes: None,
            assigned_to: None,
            node_id: None,
            scheduled_for: None,
            inline_notes: Vec::new(),
            updated_at,
            synced_at: None,
            unsynced_changes: true,
            extra: BTreeMap::new(),
        }
    }

    /// An empty stand-in used as merge base when no synced version is known.
    #[must_use]
    pub fn empty(id: &str) -> Self {
        Self {
            status: String::new(),
            unsynced_changes: false,
            ..Self::new(id, "", 0)
        }
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Set the notes summary.
    #[must_use]
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Set the duration.
    #[must_use]
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    /// Append an inline note.
    #[must_use]
    pub fn with_inline_note(mut self, note: InlineNote) -> Self {
        self.inline_notes.push(note);
        self
    }

    /// Mark as synced at the given time.
    #[must_use]
    pub fn synced(mut self, at: i64) -> Self {
        self.synced_at = Some(at);
        self.unsynced_changes = false;
        self
    }

    /// Record a local modification.
    #[must_use]
    pub fn touched(mut self, at: i64) -> Self {
        self.updated_at = at;
        self.unsynced_changes = true;
        self
    }

    /// Deserialize a job from a queue payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a job object.
    pub fn from_value(value: &serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value.clone())
    }

    /// Serialize into a queue payload.
    ///
    /// # Errors
    ///
    /// Returns an error if an `extra` value cannot be serialized.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Syncable for Job {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn synced_at(&self) -> Option<i64> {
        self.synced_at
    }
}

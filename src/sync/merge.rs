//! Three-way merge of job records.
//!
//! Decision order, first match wins:
//! 1. Same `updated_at` on both sides: the server copy is authoritative.
//! 2. Base equals remote: only local changed, keep local.
//! 3. Base equals local: only remote changed, keep remote.
//! 4. Both diverged: start from remote, overlay the locally-favoured fields
//!    when local is strictly newer, and append every local inline note the
//!    remote does not have.
//!
//! Equality is an explicit field-by-field diff, not a comparison of
//! serialized forms. `synced_at` and `unsynced_changes` are engine
//! bookkeeping and never count as a difference.

use std::collections::{BTreeSet, HashSet};

use crate::model::{Job, RecordHeader, ResolutionStrategy};

/// Fields taken from the local copy when it is strictly newer.
pub const LOCAL_FAVORED_FIELDS: [&str; 3] = ["status", "notes", "duration_minutes"];

/// Names of the domain fields that differ between two jobs.
///
/// Keys of `extra` are reported as `extra.<key>`.
#[must_use]
pub fn diff_jobs(a: &Job, b: &Job) -> Vec<String> {
    let mut changed = Vec::new();

    macro_rules! cmp {
        ($($field:ident),+) => {
            $(
                if a.$field != b.$field {
                    changed.push(stringify!($field).to_string());
                }
            )+
        };
    }

    cmp!(
        id,
        title,
        status,
        notes,
        duration_minutes,
        assigned_to,
        node_id,
        scheduled_for,
        inline_notes,
        updated_at
    );

    let keys: BTreeSet<&String> = a.extra.keys().chain(b.extra.keys()).collect();
    for key in keys {
        if a.extra.get(key) != b.extra.get(key) {
            changed.push(format!("extra.{key}"));
        }
    }

    changed
}

/// True when `diff_jobs` finds nothing.
#[must_use]
pub fn structurally_equal(a: &Job, b: &Job) -> bool {
    diff_jobs(a, b).is_empty()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MergeResolver;

impl MergeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reconcile `local` and `remote` against their common ancestor.
    #[must_use]
    pub fn merge(&self, local: &Job, remote: &Job, base: &Job) -> Job {
        self.merge_with_strategy(local, remote, base).0
    }

    /// Like [`merge`](Self::merge), also reporting which rule decided.
    #[must_use]
    pub fn merge_with_strategy(
        &self,
        local: &Job,
        remote: &Job,
        base: &Job,
    ) -> (Job, ResolutionStrategy) {
        if remote.updated_at == local.updated_at {
            return (remote.clone(), ResolutionStrategy::Remote);
        }
        if structurally_equal(base, remote) {
            return (local.clone(), ResolutionStrategy::Local);
        }
        if structurally_equal(base, local) {
            return (remote.clone(), ResolutionStrategy::Remote);
        }

        let mut merged = remote.clone();

        if local.updated_at > remote.updated_at {
            merged.status.clone_from(&local.status);
            merged.notes.clone_from(&local.notes);
            merged.duration_minutes = local.duration_minutes;
        }

        let known: HashSet<&str> = remote.inline_notes.iter().map(|n| n.id.as_str()).collect();
        merged.inline_notes.extend(
            local
                .inline_notes
                .iter()
                .filter(|n| !known.contains(n.id.as_str()))
                .cloned(),
        );

        merged.unsynced_changes = false;
        (merged, ResolutionStrategy::Merge)
    }
}

/// Whole-record resolution for entity types without merge rules.
///
/// The newer `updated_at` wins; a tie goes to the server.
#[must_use]
pub fn resolve_by_timestamp(local: &RecordHeader, remote: &RecordHeader) -> ResolutionStrategy {
    if local.updated_at > remote.updated_at {
        ResolutionStrategy::Local
    } else {
        ResolutionStrategy::Remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InlineNote;
    use serde_json::json;

    fn base() -> Job {
        Job::new("job_1", "Splice repair", 5)
            .with_status("Scheduled")
            .with_notes("initial")
            .with_duration(30)
            .with_inline_note(InlineNote::new("n1", "arrived", 4))
            .synced(5)
    }

    fn note_ids(job: &Job) -> Vec<&str> {
        job.inline_notes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let x = base();
        assert_eq!(MergeResolver::new().merge(&x, &x, &x), x);
    }

    #[test]
    fn test_only_local_changed() {
        let b = base();
        let local = b.clone().with_status("In Progress").touched(10);
        let merged = MergeResolver::new().merge(&local, &b, &b);
        assert_eq!(merged, local);
    }

    #[test]
    fn test_only_remote_changed() {
        let b = base();
        let mut remote = b.clone().with_notes("rescheduled");
        remote.updated_at = 8;
        let local = b.clone().touched(7);
        let (merged, strategy) = MergeResolver::new().merge_with_strategy(&local, &remote, &local);
        assert_eq!(merged, remote);
        assert_eq!(strategy, ResolutionStrategy::Remote);
    }

    #[test]
    fn test_same_version_marker_returns_remote() {
        let b = base();
        let mut local = b.clone().with_status("Done");
        local.updated_at = 20;
        let mut remote = b.clone().with_status("Cancelled");
        remote.updated_at = 20;

        let merged = MergeResolver::new().merge(&local, &remote, &b);
        assert_eq!(merged.status, "Cancelled");
    }

    #[test]
    fn test_concurrent_edits_local_newer() {
        let b = base();
        let local = b.clone().with_status("In Progress").touched(10);
        let mut remote = b.clone().with_notes("rescheduled");
        remote.updated_at = 8;

        let (merged, strategy) = MergeResolver::new().merge_with_strategy(&local, &remote, &b);

        assert_eq!(strategy, ResolutionStrategy::Merge);
        assert_eq!(merged.status, "In Progress");
        // local's notes summary is overlaid because local is newer
        assert_eq!(merged.notes.as_deref(), Some("initial"));
        assert_eq!(merged.updated_at, 8);
        assert!(!merged.unsynced_changes);
    }

    #[test]
    fn test_concurrent_edits_remote_newer_keeps_remote_fields() {
        let b = base();
        let local = b.clone().with_status("In Progress").touched(7);
        let mut remote = b.clone().with_notes("rescheduled").with_duration(45);
        remote.updated_at = 12;

        let merged = MergeResolver::new().merge(&local, &remote, &b);

        assert_eq!(merged.status, "Scheduled");
        assert_eq!(merged.notes.as_deref(), Some("rescheduled"));
        assert_eq!(merged.duration_minutes, Some(45));
    }

    #[test]
    fn test_inline_notes_are_appended_in_order() {
        let b = base();
        let local = b
            .clone()
            .with_inline_note(InlineNote::new("n2", "fibre cut", 6))
            .with_inline_note(InlineNote::new("n3", "spliced", 9))
            .touched(9);
        let mut remote = b.clone().with_inline_note(InlineNote::new("r1", "call customer", 7));
        remote.updated_at = 11;

        let merged = MergeResolver::new().merge(&local, &remote, &b);
        assert_eq!(note_ids(&merged), vec!["n1", "r1", "n2", "n3"]);
    }

    #[test]
    fn test_note_merge_never_drops_remote_notes() {
        let b = Job::new("job_1", "t", 1).synced(1);
        let local = b
            .clone()
            .with_inline_note(InlineNote::new("A", "a", 2))
            .with_inline_note(InlineNote::new("B", "b", 3))
            .touched(3);
        let mut remote = b.clone().with_inline_note(InlineNote::new("A", "a", 2));
        remote.title = "renamed".into();
        remote.updated_at = 4;

        let merged = MergeResolver::new().merge(&local, &remote, &b);
        assert_eq!(note_ids(&merged), vec!["A", "B"]);
        assert_eq!(merged.title, "renamed");
    }

    #[test]
    fn test_diff_ignores_sync_bookkeeping() {
        let a = base();
        let mut b = a.clone();
        b.synced_at = Some(99);
        b.unsynced_changes = true;
        assert!(structurally_equal(&a, &b));
    }

    #[test]
    fn test_diff_reports_fields_and_extra_keys() {
        let a = base();
        let mut b = a.clone().with_status("Done");
        b.extra.insert("priority".into(), json!("high"));

        assert_eq!(diff_jobs(&a, &b), vec!["status", "extra.priority"]);
    }

    #[test]
    fn test_resolve_by_timestamp() {
        let header = |updated_at| RecordHeader {
            id: "node_1".into(),
            updated_at,
            synced_at: Some(1),
        };
        assert_eq!(resolve_by_timestamp(&header(5), &header(3)), ResolutionStrategy::Local);
        assert_eq!(resolve_by_timestamp(&header(3), &header(5)), ResolutionStrategy::Remote);
        assert_eq!(resolve_by_timestamp(&header(4), &header(4)), ResolutionStrategy::Remote);
    }
}

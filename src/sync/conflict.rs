//! Concurrent-modification detection.
//!
//! A conflict exists only when both sides moved past the last confirmed
//! sync point. A record that was never synced is new, not a collision.

use crate::model::Syncable;

/// Which sides changed since the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    /// Neither side moved past the sync point.
    None,
    /// Only the local copy changed (or it was never synced).
    LocalOnly,
    /// Only the remote copy changed.
    RemoteOnly,
    /// Both changed independently.
    Both,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictDetector;

impl ConflictDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// True iff both sides were modified after `local.synced_at`.
    #[must_use]
    pub fn has_conflict<L: Syncable, R: Syncable>(&self, local: &L, remote: &R) -> bool {
        self.classify(local, remote) == Divergence::Both
    }

    #[must_use]
    pub fn classify<L: Syncable, R: Syncable>(&self, local: &L, remote: &R) -> Divergence {
        let Some(last_sync) = local.synced_at() else {
            return Divergence::LocalOnly;
        };

        match (
            local.updated_at() > last_sync,
            remote.updated_at() > last_sync,
        ) {
            (true, true) => Divergence::Both,
            (true, false) => Divergence::LocalOnly,
            (false, true) => Divergence::RemoteOnly,
            (false, false) => Divergence::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;

    #[test]
    fn test_never_synced_is_not_a_conflict() {
        let local = Job::new("job_1", "t", 100);
        let remote = Job::new("job_1", "t", 500);
        let detector = ConflictDetector::new();

        assert!(!detector.has_conflict(&local, &remote));
        assert_eq!(detector.classify(&local, &remote), Divergence::LocalOnly);
    }

    #[test]
    fn test_both_changed_after_sync() {
        let local = Job::new("job_1", "t", 5).synced(5).touched(10);
        let remote = Job::new("job_1", "t", 8);
        assert!(ConflictDetector::new().has_conflict(&local, &remote));
    }

    #[test]
    fn test_single_side_changes() {
        let detector = ConflictDetector::new();
        let synced = Job::new("job_1", "t", 5).synced(5);

        let local_changed = synced.clone().touched(10);
        let remote_same = Job::new("job_1", "t", 5);
        assert!(!detector.has_conflict(&local_changed, &remote_same));
        assert_eq!(
            detector.classify(&local_changed, &remote_same),
            Divergence::LocalOnly
        );

        let remote_changed = Job::new("job_1", "t", 9);
        assert!(!detector.has_conflict(&synced, &remote_changed));
        assert_eq!(
            detector.classify(&synced, &remote_changed),
            Divergence::RemoteOnly
        );

        assert_eq!(detector.classify(&synced, &remote_same), Divergence::None);
    }

    #[test]
    fn test_equal_to_sync_point_is_unchanged() {
        let local = Job::new("job_1", "t", 5).synced(5);
        let remote = Job::new("job_1", "t", 5);
        assert!(!ConflictDetector::new().has_conflict(&local, &remote));
    }
}

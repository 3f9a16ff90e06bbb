//! Watermark-based change selection.

use crate::model::Syncable;

/// Records modified strictly after `watermark`, in input order.
///
/// A missing watermark (nothing synced yet) selects every record.
#[must_use]
pub fn select_changed_since<T: Syncable>(records: &[T], watermark: Option<i64>) -> Vec<&T> {
    records
        .iter()
        .filter(|r| watermark.is_none_or(|w| r.updated_at() > w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;

    #[test]
    fn test_filters_and_preserves_order() {
        let records = vec![
            Job::new("a", "", 30),
            Job::new("b", "", 10),
            Job::new("c", "", 20),
            Job::new("d", "", 50),
        ];

        let ids: Vec<&str> = select_changed_since(&records, Some(20))
            .into_iter()
            .map(|j| j.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_no_watermark_selects_all() {
        let records = vec![Job::new("a", "", 1), Job::new("b", "", 2)];
        assert_eq!(select_changed_since(&records, None).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<Job> = Vec::new();
        assert!(select_changed_since(&records, Some(0)).is_empty());
    }
}

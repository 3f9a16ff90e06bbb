//! Exponential backoff bookkeeping for failed uploads.
//!
//! Pure state and arithmetic: no clock reads, no I/O. The caller passes the
//! failure time in, so the same inputs always produce the same schedule.
//!
//! Delay after the n-th consecutive failure is `base * 2^(n-1)`, capped:
//! with the defaults the waits are 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Retry limits shared by every queue item.
///
/// One policy governs all items; `max_attempts` counts failed uploads,
/// after which the item is abandoned to the dead-letter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub cap_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            cap_delay_ms: 30_000,
            max_attempts: 3,
        }
    }
}

/// Failure history for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Number of recorded failures.
    pub attempts: u32,
    /// When the last failure happened (Unix milliseconds)
    pub last_failure_at: Option<i64>,
}

/// Per-key backoff state.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    states: HashMap<String, RetryState>,
}

impl RetryScheduler {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            states: HashMap::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// `min(base * 2^attempts, cap)`, saturating at the cap on overflow.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> u64 {
        2u64.checked_pow(attempts)
            .and_then(|factor| self.policy.base_delay_ms.checked_mul(factor))
            .map_or(self.policy.cap_delay_ms, |delay| {
                delay.min(self.policy.cap_delay_ms)
            })
    }

    /// Failures recorded for `key`.
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        self.states.get(key).map_or(0, |s| s.attempts)
    }

    #[must_use]
    pub fn state(&self, key: &str) -> Option<RetryState> {
        self.states.get(key).copied()
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub fn should_retry(&self, key: &str) -> bool {
        self.attempts(key) < self.policy.max_attempts
    }

    /// Record a failed attempt at `at`, returning the new attempt count.
    pub fn record_attempt(&mut self, key: &str, at: i64) -> u32 {
        let state = self.states.entry(key.to_string()).or_default();
        state.attempts = state.attempts.saturating_add(1);
        state.last_failure_at = Some(at);
        state.attempts
    }

    /// Earliest time `key` may be retried; `None` if it never failed.
    #[must_use]
    pub fn next_eligible_at(&self, key: &str) -> Option<i64> {
        let state = self.states.get(key)?;
        let last = state.last_failure_at?;
        let delay = i64::try_from(self.delay_for(state.attempts.saturating_sub(1)))
            .unwrap_or(i64::MAX);
        Some(last.saturating_add(delay))
    }

    /// Whether `key` may be attempted at `now`.
    #[must_use]
    pub fn is_due(&self, key: &str, now: i64) -> bool {
        self.next_eligible_at(key).is_none_or(|at| now >= at)
    }

    /// Rebuild state for an item loaded from the store.
    pub fn restore(&mut self, key: &str, attempts: u32, last_failure_at: Option<i64>) {
        if attempts == 0 {
            self.states.remove(key);
            return;
        }
        self.states.insert(
            key.to_string(),
            RetryState {
                attempts,
                last_failure_at,
            },
        );
    }

    /// Clear all state for `key` (called on confirmed success).
    pub fn reset(&mut self, key: &str) {
        self.states.remove(key);
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Number of keys with failure history.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_table() {
        let scheduler = RetryScheduler::default();
        let delays: Vec<u64> = (0..=6).map(|n| scheduler.delay_for(n)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_delay_saturates_on_overflow() {
        let scheduler = RetryScheduler::default();
        assert_eq!(scheduler.delay_for(63), 30_000);
        assert_eq!(scheduler.delay_for(64), 30_000);
        assert_eq!(scheduler.delay_for(u32::MAX), 30_000);
    }

    #[test]
    fn test_never_failed_is_due() {
        let scheduler = RetryScheduler::default();
        assert!(scheduler.is_due("a", 0));
        assert!(scheduler.next_eligible_at("a").is_none());
        assert!(scheduler.should_retry("a"));
    }

    #[test]
    fn test_backoff_window() {
        let mut scheduler = RetryScheduler::default();

        scheduler.record_attempt("a", 0);
        assert_eq!(scheduler.next_eligible_at("a"), Some(1_000));
        assert!(!scheduler.is_due("a", 999));
        assert!(scheduler.is_due("a", 1_000));

        scheduler.record_attempt("a", 1_000);
        assert_eq!(scheduler.next_eligible_at("a"), Some(3_000));
        assert!(!scheduler.is_due("a", 2_999));
        assert!(scheduler.is_due("a", 3_000));
    }

    #[test]
    fn test_should_retry_until_max() {
        let mut scheduler = RetryScheduler::default();
        assert_eq!(scheduler.record_attempt("a", 0), 1);
        assert!(scheduler.should_retry("a"));
        assert_eq!(scheduler.record_attempt("a", 1), 2);
        assert!(scheduler.should_retry("a"));
        assert_eq!(scheduler.record_attempt("a", 2), 3);
        assert!(!scheduler.should_retry("a"));
    }

    #[test]
    fn test_keys_are_independent_and_reset_clears() {
        let mut scheduler = RetryScheduler::default();
        scheduler.record_attempt("a", 0);
        scheduler.record_attempt("a", 0);
        scheduler.record_attempt("b", 0);

        assert_eq!(scheduler.attempts("a"), 2);
        assert_eq!(scheduler.attempts("b"), 1);

        scheduler.reset("a");
        assert_eq!(scheduler.attempts("a"), 0);
        assert!(scheduler.is_due("a", 0));
        assert_eq!(scheduler.tracked(), 1);
    }

    #[test]
    fn test_restore() {
        let mut scheduler = RetryScheduler::default();
        scheduler.restore("a", 2, Some(10_000));
        assert_eq!(scheduler.next_eligible_at("a"), Some(12_000));

        scheduler.restore("a", 0, None);
        assert_eq!(scheduler.tracked(), 0);
    }

    #[test]
    fn test_custom_policy() {
        let scheduler = RetryScheduler::new(RetryPolicy {
            base_delay_ms: 250,
            cap_delay_ms: 1_000,
            max_attempts: 5,
        });
        assert_eq!(scheduler.delay_for(0), 250);
        assert_eq!(scheduler.delay_for(2), 1_000);
        assert_eq!(scheduler.policy().max_attempts, 5);
    }
}

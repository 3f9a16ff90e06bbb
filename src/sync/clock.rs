//! Time and identity sources injected into the engine.
//!
//! Every timestamp the engine reads comes from one `Clock`, and every queue
//! id from one `IdGenerator`, so retry timing and ids are deterministic
//! under test.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Move forward by `ms`.
    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Produces queue item ids.
pub type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Random ids in the `sq_<12 hex>` form.
#[must_use]
pub fn uuid_ids() -> IdGenerator {
    Box::new(|| format!("sq_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]))
}

/// Sequential ids (`<prefix>1`, `<prefix>2`, ...) for tests and replays.
#[must_use]
pub fn sequential_ids(prefix: &str) -> IdGenerator {
    let prefix = prefix.to_string();
    let counter = AtomicU64::new(0);
    Box::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_sequential_ids() {
        let next = sequential_ids("item_");
        assert_eq!(next(), "item_1");
        assert_eq!(next(), "item_2");
    }

    #[test]
    fn test_uuid_ids_shape() {
        let next = uuid_ids();
        let id = next();
        assert!(id.starts_with("sq_"));
        assert_eq!(id.len(), 15);
        assert_ne!(id, next());
    }
}

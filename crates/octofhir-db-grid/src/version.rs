//! Monotonic version stamps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, LazyLock};

use time::OffsetDateTime;

/// Wall-clock source in milliseconds. Need not be monotonic.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

static GLOBAL: LazyLock<Arc<VersionOracle>> = LazyLock::new(|| Arc::new(VersionOracle::new()));

/// Issues strictly increasing version numbers.
///
/// A version is the current time in milliseconds, or the last issued
/// version plus one when the clock has not moved past it (same tick, or
/// the clock went backwards). The choice is published with a CAS loop, so
/// concurrent callers never receive the same value.
pub struct VersionOracle {
    last_issued: AtomicI64,
    clock: Box<dyn Clock>,
}

impl VersionOracle {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            last_issued: AtomicI64::new(i64::MIN),
            clock,
        }
    }

    /// The process-wide oracle shared by every store.
    pub fn global() -> Arc<VersionOracle> {
        GLOBAL.clone()
    }

    pub fn next_version(&self) -> i64 {
        let mut last = self.last_issued.load(Ordering::Acquire);
        loop {
            let now = self.clock.now_millis();
            let candidate = if now > last { now } else { last + 1 };
            match self.last_issued.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Records a version issued elsewhere (e.g. found while rebuilding
    /// indexes) so later stamps are greater than it.
    pub fn observe(&self, version: i64) {
        self.last_issued.fetch_max(version, Ordering::AcqRel);
    }

    pub fn last_issued(&self) -> Option<i64> {
        let last = self.last_issued.load(Ordering::Acquire);
        (last != i64::MIN).then_some(last)
    }
}

impl Default for VersionOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VersionOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionOracle")
            .field("last_issued", &self.last_issued())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Clock pinned to a settable value.
    struct ManualClock(Arc<AtomicI64>);

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn manual(start: i64) -> (VersionOracle, Arc<AtomicI64>) {
        let time = Arc::new(AtomicI64::new(start));
        let oracle = VersionOracle::with_clock(Box::new(ManualClock(time.clone())));
        (oracle, time)
    }

    #[test]
    fn test_uses_clock_when_it_advances() {
        let (oracle, time) = manual(1_000);
        assert_eq!(oracle.next_version(), 1_000);
        time.store(2_000, Ordering::SeqCst);
        assert_eq!(oracle.next_version(), 2_000);
    }

    #[test]
    fn test_same_tick_increments() {
        let (oracle, _time) = manual(1_000);
        assert_eq!(oracle.next_version(), 1_000);
        assert_eq!(oracle.next_version(), 1_001);
        assert_eq!(oracle.next_version(), 1_002);
    }

    #[test]
    fn test_clock_going_backwards() {
        let (oracle, time) = manual(5_000);
        let first = oracle.next_version();
        time.store(10, Ordering::SeqCst);
        let second = oracle.next_version();
        assert!(second > first);
        assert_eq!(second, 5_001);
    }

    #[test]
    fn test_observe_moves_floor() {
        let (oracle, _time) = manual(100);
        oracle.observe(10_000);
        assert_eq!(oracle.next_version(), 10_001);
        oracle.observe(5);
        assert_eq!(oracle.last_issued(), Some(10_001));
    }

    #[test]
    fn test_concurrent_callers_get_unique_increasing_versions() {
        let oracle = Arc::new(VersionOracle::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let oracle = oracle.clone();
                std::thread::spawn(move || {
                    (0..1000).map(|_| oracle.next_version()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in threads {
            let versions = handle.join().unwrap();
            assert!(versions.windows(2).all(|w| w[0] < w[1]));
            all.extend(versions);
        }
        assert_eq!(all.len(), 8000);
    }

    #[test]
    fn test_versions_increase_in_completion_order() {
        let oracle = Arc::new(VersionOracle::new());
        let completed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let oracle = oracle.clone();
                let completed = completed.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        // Issue and record under one lock so the log order is
                        // the order in which calls completed.
                        let mut log = completed.lock().unwrap();
                        log.push(oracle.next_version());
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let log = completed.lock().unwrap();
        assert_eq!(log.len(), 4000);
        assert!(log.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&VersionOracle::global(), &VersionOracle::global()));
    }
}

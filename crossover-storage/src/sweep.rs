//! Rate gate for opportunistic sweeps of process-local state.

use std::sync::atomic::{AtomicI64, Ordering};

use crossover_core::constants::LOCAL_SWEEP_INTERVAL_MS;

/// Lets at most one caller per interval run a full sweep.
#[derive(Debug)]
pub(crate) struct SweepGate {
    last_ms: AtomicI64,
    interval_ms: i64,
}

impl Default for SweepGate {
    fn default() -> Self {
        Self::new(LOCAL_SWEEP_INTERVAL_MS)
    }
}

impl SweepGate {
    pub(crate) fn new(interval_ms: i64) -> Self {
        Self {
            last_ms: AtomicI64::new(i64::MIN),
            interval_ms: interval_ms.max(0),
        }
    }

    /// True when a sweep is due at `now_ms`. The winning caller claims the
    /// slot, so concurrent callers see `false`.
    pub(crate) fn due(&self, now_ms: i64) -> bool {
        let last = self.last_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.interval_ms {
            return false;
        }
        self.last_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

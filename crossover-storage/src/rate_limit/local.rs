//! Process-local fixed-window counters.

use dashmap::DashMap;

use super::RateLimitDecision;
use crate::sweep::SweepGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowEntry {
    count: u32,
    reset_at_ms: i64,
}

/// Per-key window counters shared by every limiter in the process.
///
/// Thread-safe: each decision runs under the shard lock taken by the
/// `DashMap` entry API, so concurrent calls for one key never double count.
#[derive(Debug, Default)]
pub struct LocalWindowStore {
    windows: DashMap<String, WindowEntry>,
    sweep_gate: SweepGate,
}

impl LocalWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `key` and decide whether it is allowed.
    ///
    /// `limit` must be non-zero and `window_ms` positive; the limiter
    /// handles the degenerate cases before calling in.
    pub fn consume(&self, key: &str, limit: u32, window_ms: i64, now_ms: i64) -> RateLimitDecision {
        if self.sweep_gate.due(now_ms) {
            self.sweep(now_ms);
        }

        let fresh = WindowEntry {
            count: 0,
            reset_at_ms: now_ms.saturating_add(window_ms),
        };
        let mut entry = self.windows.entry(key.to_string()).or_insert(fresh);
        if entry.reset_at_ms <= now_ms {
            *entry = fresh;
        }

        if entry.count == 0 {
            entry.count = 1;
            return RateLimitDecision::allow(limit - 1);
        }

        if entry.count < limit {
            entry.count += 1;
            return RateLimitDecision::allow(limit - entry.count);
        }

        let wait = entry.reset_at_ms.saturating_sub(now_ms).max(0);
        RateLimitDecision::deny(u64::try_from(wait).unwrap_or(0))
    }

    /// Drop every window whose reset time has passed. `consume` runs this
    /// at most once per sweep interval.
    pub fn sweep(&self, now_ms: i64) {
        self.windows.retain(|_, entry| entry.reset_at_ms > now_ms);
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Current count for `key`, if it has a live window.
    pub fn count(&self, key: &str) -> Option<u32> {
        self.windows.get(key).map(|entry| entry.count)
    }
}

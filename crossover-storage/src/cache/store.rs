//! Process-local cache state.
//!
//! [`SnapshotStore`] holds the current cache version together with the
//! entries stamped with it. Both live behind one async `RwLock`, so a
//! version bump and the clearing of old entries are a single step from the
//! point of view of every reader. Construct one per process (or per test)
//! and share it through an `Arc`.

use std::collections::HashMap;

use crossover_core::constants::INITIAL_CACHE_VERSION;
use tokio::sync::RwLock;

/// A locally cached value and its absolute expiry.
#[derive(Debug, Clone)]
pub(crate) struct LocalEntry<V> {
    pub(crate) value: V,
    pub(crate) expires_at_ms: i64,
}

impl<V> LocalEntry<V> {
    pub(crate) fn new(value: V, expires_at_ms: i64) -> Self {
        Self {
            value,
            expires_at_ms,
        }
    }

    pub(crate) fn is_live(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[derive(Debug)]
struct SnapshotState<V> {
    version: u64,
    entries: HashMap<String, LocalEntry<V>>,
}

/// Versioned in-memory snapshot store. Thread-safe.
#[derive(Debug)]
pub struct SnapshotStore<V> {
    state: RwLock<SnapshotState<V>>,
}

impl<V> Default for SnapshotStore<V> {
    fn default() -> Self {
        Self::with_version(INITIAL_CACHE_VERSION)
    }
}

fn entry_key(version: u64, key: &str) -> String {
    format!("{}:{}", version, key)
}

impl<V> SnapshotStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: u64) -> Self {
        Self {
            state: RwLock::new(SnapshotState {
                version,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<V: Clone> SnapshotStore<V> {
    /// Current local version.
    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Adopt `observed` if it is ahead of the local version.
    ///
    /// Entries stamped with older versions can never be read again once the
    /// version moves, so they are dropped in the same step. Returns the
    /// resulting local version.
    pub async fn adopt(&self, observed: u64) -> u64 {
        let mut state = self.state.write().await;
        if observed > state.version {
            state.version = observed;
            state.entries.clear();
        }
        state.version
    }

    /// Increment the version by one and drop every local entry.
    pub async fn bump(&self) -> u64 {
        let mut state = self.state.write().await;
        state.version += 1;
        state.entries.clear();
        state.version
    }

    /// Look up `key` under `version`. Expired entries are removed.
    pub async fn get(&self, version: u64, key: &str, now_ms: i64) -> Option<V> {
        let composite = entry_key(version, key);
        {
            let state = self.state.read().await;
            if state.version != version {
                return None;
            }
            match state.entries.get(&composite) {
                Some(entry) if entry.is_live(now_ms) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut state = self.state.write().await;
        if state
            .entries
            .get(&composite)
            .is_some_and(|entry| !entry.is_live(now_ms))
        {
            state.entries.remove(&composite);
        }
        None
    }

    /// Store `value` under `version`.
    ///
    /// Refused (returns `false`) when the version has moved on since the
    /// caller read it: a producer that started before a bump must not
    /// populate the store.
    pub async fn insert(&self, version: u64, key: &str, value: V, expires_at_ms: i64) -> bool {
        let mut state = self.state.write().await;
        if state.version != version {
            return false;
        }
        state
            .entries
            .insert(entry_key(version, key), LocalEntry::new(value, expires_at_ms));
        true
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn purge_expired(&self, now_ms: i64) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now_ms));
        before - state.entries.len()
    }

    /// Number of entries currently held (live or not yet purged).
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_at_initial_version() {
        let store: SnapshotStore<String> = SnapshotStore::new();
        assert_eq!(store.version().await, INITIAL_CACHE_VERSION);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_bump_clears_entries() {
        let store = SnapshotStore::new();
        assert!(store.insert(1, "root", "v1".to_string(), 10_000).await);
        assert_eq!(store.get(1, "root", 0).await.as_deref(), Some("v1"));

        assert_eq!(store.bump().await, 2);
        assert!(store.is_empty().await);
        assert_eq!(store.get(1, "root", 0).await, None);
    }

    #[tokio::test]
    async fn test_insert_under_stale_version_is_refused() {
        let store = SnapshotStore::new();
        store.bump().await;
        assert!(!store.insert(1, "root", "old".to_string(), 10_000).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_adopt_only_moves_forward() {
        let store: SnapshotStore<String> = SnapshotStore::with_version(5);
        assert_eq!(store.adopt(3).await, 5);
        assert_eq!(store.adopt(9).await, 9);
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let store = SnapshotStore::new();
        store.insert(1, "root", "v".to_string(), 100).await;
        assert_eq!(store.get(1, "root", 99).await.as_deref(), Some("v"));
        assert_eq!(store.get(1, "root", 100).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SnapshotStore::new();
        store.insert(1, "a", 1u32, 100).await;
        store.insert(1, "b", 2u32, 500).await;
        assert_eq!(store.purge_expired(200).await, 1);
        assert_eq!(store.len().await, 1);
    }
}

//! Crossover Test Utilities
//!
//! Shared test infrastructure for the Crossover workspace:
//! - Proptest generators for graphs
//! - Failing and flaky key/value backends
//! - A graph store with injectable failures
//! - Fixtures and assertions

pub use crossover_core::{
    BackendError, BackendResult, CrossoverConfig, CrossoverError, CrossoverResult, EvidenceStatus,
    ManualClock, NodeId, NodeRecord, StorageError,
};
pub use crossover_graph::{GraphStore, InMemoryGraphStore};
pub use crossover_storage::{InMemoryBackend, KeyValueBackend};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use crossover_core::EdgeRecord;
use crossover_graph::{Adjacency, LevelUpdate, StorageResult};
use serde_json::Value;

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber for tests, once per process.
///
/// Honors `RUST_LOG`; defaults to `warn` so fallback paths stay visible.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// KEY/VALUE BACKENDS
// ============================================================================

pub mod backends {
    //! Backends that misbehave on purpose.

    use super::*;

    fn unavailable() -> BackendError {
        BackendError::Transport {
            endpoint: "http://kv.test".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    /// Backend whose every call fails with a transport error.
    #[derive(Debug, Default)]
    pub struct FailingBackend {
        calls: AtomicUsize,
    }

    impl FailingBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of calls attempted so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail<T>(&self) -> BackendResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        }
    }

    #[async_trait]
    impl KeyValueBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _key: &str) -> BackendResult<Option<Value>> {
            self.fail()
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> BackendResult<()> {
            self.fail()
        }

        async fn incr(&self, _key: &str) -> BackendResult<Value> {
            self.fail()
        }

        async fn expire(&self, _key: &str, _ttl: u64) -> BackendResult<Value> {
            self.fail()
        }

        async fn pttl(&self, _key: &str) -> BackendResult<Value> {
            self.fail()
        }

        async fn incr_with_expiry(&self, _key: &str, _ttl: u64) -> BackendResult<Vec<Value>> {
            self.fail()
        }
    }

    /// In-memory backend that can be switched off and on.
    #[derive(Debug)]
    pub struct FlakyBackend {
        inner: InMemoryBackend,
        down: AtomicBool,
    }

    impl FlakyBackend {
        pub fn new(clock: Arc<ManualClock>) -> Self {
            Self {
                inner: InMemoryBackend::new(clock),
                down: AtomicBool::new(false),
            }
        }

        pub fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        pub fn inner(&self) -> &InMemoryBackend {
            &self.inner
        }

        fn check(&self) -> BackendResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(unavailable())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KeyValueBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn get(&self, key: &str) -> BackendResult<Option<Value>> {
            self.check()?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> BackendResult<()> {
            self.check()?;
            self.inner.set(key, value, ttl_secs).await
        }

        async fn incr(&self, key: &str) -> BackendResult<Value> {
            self.check()?;
            self.inner.incr(key).await
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> BackendResult<Value> {
            self.check()?;
            self.inner.expire(key, ttl_secs).await
        }

        async fn pttl(&self, key: &str) -> BackendResult<Value> {
            self.check()?;
            self.inner.pttl(key).await
        }

        async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> BackendResult<Vec<Value>> {
            self.check()?;
            self.inner.incr_with_expiry(key, ttl_secs).await
        }
    }
}

// ============================================================================
// GRAPH STORES
// ============================================================================

pub mod stores {
    //! Graph store wrappers for error-path tests.

    use super::*;

    /// Wraps an [`InMemoryGraphStore`] and fails reads or writes on demand.
    #[derive(Debug, Default)]
    pub struct FaultyGraphStore {
        inner: InMemoryGraphStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl FaultyGraphStore {
        pub fn new(inner: InMemoryGraphStore) -> Self {
            Self {
                inner,
                ..Self::default()
            }
        }

        pub fn inner(&self) -> &InMemoryGraphStore {
            &self.inner
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn check_read(&self) -> StorageResult<()> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::ReadFailed {
                    reason: "injected read failure".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl GraphStore for FaultyGraphStore {
        async fn list_root_nodes(&self) -> StorageResult<Vec<NodeId>> {
            self.check_read()?;
            self.inner.list_root_nodes().await
        }

        async fn approved_adjacency(&self) -> StorageResult<Adjacency> {
            self.check_read()?;
            self.inner.approved_adjacency().await
        }

        async fn apply_level_updates(&self, updates: &[LevelUpdate]) -> StorageResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::TransactionFailed {
                    reason: "injected write failure".to_string(),
                });
            }
            self.inner.apply_level_updates(updates).await
        }

        async fn list_nodes(&self) -> StorageResult<Vec<NodeRecord>> {
            self.check_read()?;
            self.inner.list_nodes().await
        }

        async fn list_edges(&self) -> StorageResult<Vec<EdgeRecord>> {
            self.check_read()?;
            self.inner.list_edges().await
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for random graphs.

    use super::*;
    use proptest::prelude::*;

    /// A randomly generated graph description. Nodes are `n0..n{count}`.
    #[derive(Debug, Clone)]
    pub struct GraphShape {
        pub node_count: usize,
        pub roots: Vec<usize>,
        /// `(from, to, approved)`, at most one per ordered pair.
        pub edges: Vec<(usize, usize, bool)>,
    }

    impl GraphShape {
        pub fn node_id(index: usize) -> NodeId {
            NodeId::new(format!("n{}", index))
        }

        /// Materialize the shape into an in-memory store.
        pub fn build(&self) -> InMemoryGraphStore {
            let store = InMemoryGraphStore::new();
            for i in 0..self.node_count {
                let mut node = NodeRecord::new(Self::node_id(i), format!("Work {}", i), "film");
                if self.roots.contains(&i) {
                    node = node.root();
                }
                let _ = store.add_node(node);
            }
            for (from, to, approved) in &self.edges {
                let Ok(edge) = store.add_edge(Self::node_id(*from), Self::node_id(*to), "link")
                else {
                    continue;
                };
                let status = if *approved {
                    EvidenceStatus::Approved
                } else {
                    EvidenceStatus::Pending
                };
                let _ = store.add_evidence(edge, status);
            }
            store
        }
    }

    /// Graphs of 1..=max_nodes nodes, with self-loops and cycles allowed.
    pub fn arb_graph(max_nodes: usize) -> impl Strategy<Value = GraphShape> {
        (1..=max_nodes.max(1)).prop_flat_map(|node_count| {
            let roots = proptest::collection::btree_set(0..node_count, 0..=node_count.min(3));
            let edges = proptest::collection::btree_map(
                (0..node_count, 0..node_count),
                any::<bool>(),
                0..=node_count * 3,
            );
            (roots, edges).prop_map(move |(roots, edges)| GraphShape {
                node_count,
                roots: roots.into_iter().collect(),
                edges: edges
                    .into_iter()
                    .map(|((from, to), approved)| (from, to, approved))
                    .collect(),
            })
        })
    }

    /// Evidence status generator.
    pub fn arb_evidence_status() -> impl Strategy<Value = EvidenceStatus> {
        prop_oneof![
            Just(EvidenceStatus::Pending),
            Just(EvidenceStatus::Approved),
            Just(EvidenceStatus::Rejected),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built graphs and clocks.

    use super::*;

    /// Clock frozen at a fixed instant (2026-01-01T00:00:00Z).
    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(1_767_225_600_000))
    }

    /// Add a node with `id` as both id and title.
    pub fn add_work(store: &InMemoryGraphStore, id: &str, is_root: bool) {
        let mut node = NodeRecord::new(id, id, "film");
        if is_root {
            node = node.root();
        }
        let _ = store.add_node(node);
    }

    /// Add an edge carrying a single evidence record with `status`.
    pub fn link(store: &InMemoryGraphStore, from: &str, to: &str, status: EvidenceStatus) {
        if let Ok(edge) = store.add_edge(from, to, "crossover") {
            let _ = store.add_evidence(edge, status);
        }
    }

    /// `R -> A -> B -> C` plus the shortcut `R -> C`, all approved.
    pub fn chain_with_shortcut() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        add_work(&store, "R", true);
        for id in ["A", "B", "C"] {
            add_work(&store, id, false);
        }
        for (from, to) in [("R", "A"), ("A", "B"), ("B", "C"), ("R", "C")] {
            link(&store, from, to, EvidenceStatus::Approved);
        }
        store
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Crossover results.

    use super::*;

    /// Assert that a result is a storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &CrossoverResult<T>) {
        match result {
            Err(CrossoverError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert the stored level of the edge `from -> to`.
    #[track_caller]
    pub fn assert_edge_level(store: &InMemoryGraphStore, from: &str, to: &str, expected: Option<u32>) {
        let levels = match store.edge_levels() {
            Ok(levels) => levels,
            Err(e) => panic!("Could not read edge levels: {}", e),
        };
        let key = (NodeId::from(from), NodeId::from(to));
        match levels.get(&key) {
            Some(level) => assert_eq!(*level, expected, "Wrong level on {} -> {}", from, to),
            None => panic!("No edge {} -> {}", from, to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::backends::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chain_fixture_shape() {
        let store = fixtures::chain_with_shortcut();
        assert_eq!(store.node_count(), 4);
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn test_flaky_backend_toggles() {
        let rt = tokio_runtime();
        rt.block_on(async {
            let backend = FlakyBackend::new(fixtures::manual_clock());
            backend.set("k", "1", None).await.unwrap();
            backend.set_down(true);
            assert!(backend.get("k").await.is_err());
            backend.set_down(false);
            assert!(backend.get("k").await.unwrap().is_some());
        });
    }

    fn tokio_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().build().unwrap()
    }

    proptest! {
        #[test]
        fn prop_generated_graph_builds(shape in generators::arb_graph(8)) {
            let store = shape.build();
            prop_assert_eq!(store.node_count(), shape.node_count);
            prop_assert_eq!(store.edge_count(), shape.edges.len());
        }
    }
}

//! Level recomputation.

use std::sync::Arc;

use crossover_core::CrossoverResult;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::levels::{compute_levels, group_by_level};
use crate::store::GraphStore;

/// Result of one recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    /// False when the graph has no roots; nothing was written.
    pub success: bool,
    /// Number of nodes that received a level.
    pub updated: usize,
}

impl RecomputeOutcome {
    pub fn no_roots() -> Self {
        Self {
            success: false,
            updated: 0,
        }
    }
}

/// Recomputes edge levels from the current roots and approved edges.
///
/// Calls on one engine are serialized. Separate engines (or processes)
/// sharing a store must be serialized by the caller.
pub struct LevelGraphEngine {
    store: Arc<dyn GraphStore>,
    gate: Mutex<()>,
}

impl LevelGraphEngine {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Rebuild every edge level from scratch.
    ///
    /// Each edge whose destination is reachable over approved edges gets that
    /// node's shortest distance from any root. Edges into unreachable nodes
    /// keep whatever level they had. All writes go out as one atomic batch.
    pub async fn recompute(&self) -> CrossoverResult<RecomputeOutcome> {
        let _guard = self.gate.lock().await;

        let roots = self.store.list_root_nodes().await?;
        if roots.is_empty() {
            tracing::info!("No root nodes; level recomputation skipped");
            return Ok(RecomputeOutcome::no_roots());
        }

        let adjacency = self.store.approved_adjacency().await?;
        let levels = compute_levels(&roots, &adjacency);
        let updates = group_by_level(&levels);

        if let Err(e) = self.store.apply_level_updates(&updates).await {
            tracing::warn!(error = %e, batches = updates.len(), "Level batch rejected");
            return Err(e.into());
        }

        tracing::info!(
            roots = roots.len(),
            updated = levels.len(),
            batches = updates.len(),
            "Edge levels recomputed"
        );
        Ok(RecomputeOutcome {
            success: true,
            updated: levels.len(),
        })
    }
}

impl std::fmt::Debug for LevelGraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelGraphEngine").finish_non_exhaustive()
    }
}

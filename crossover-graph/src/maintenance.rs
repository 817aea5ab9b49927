//! Upkeep after graph mutations.
//!
//! Collaborators that mutate the graph call one of the `after_*` hooks so
//! that stored levels and cached snapshots follow the change.

use std::sync::Arc;

use crossover_core::{CrossoverResult, EvidenceStatus};
use crossover_storage::VersionedSnapshotCache;

use crate::engine::{LevelGraphEngine, RecomputeOutcome};
use crate::snapshot::GraphSnapshot;

/// What a maintenance hook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Levels were recomputed.
    Recomputed(RecomputeOutcome),
    /// The snapshot cache was invalidated; carries the new version.
    Invalidated(u64),
    /// Nothing needed doing.
    Unchanged,
}

/// Ties the level engine and the snapshot cache together.
#[derive(Clone)]
pub struct GraphMaintenance {
    engine: Arc<LevelGraphEngine>,
    cache: VersionedSnapshotCache<GraphSnapshot>,
}

impl GraphMaintenance {
    pub fn new(engine: Arc<LevelGraphEngine>, cache: VersionedSnapshotCache<GraphSnapshot>) -> Self {
        Self { engine, cache }
    }

    pub fn engine(&self) -> &LevelGraphEngine {
        &self.engine
    }

    pub fn cache(&self) -> &VersionedSnapshotCache<GraphSnapshot> {
        &self.cache
    }

    /// An edge was created or deleted, or a node was deleted.
    pub async fn after_topology_change(&self) -> CrossoverResult<MaintenanceAction> {
        self.recompute().await
    }

    /// An evidence record moved from `before` to `after`.
    ///
    /// Only transitions into or out of `Approved` can change reachability.
    pub async fn after_evidence_review(
        &self,
        before: EvidenceStatus,
        after: EvidenceStatus,
    ) -> CrossoverResult<MaintenanceAction> {
        if before == after {
            return Ok(MaintenanceAction::Unchanged);
        }
        if before.is_approved() || after.is_approved() {
            return self.recompute().await;
        }
        Ok(MaintenanceAction::Invalidated(self.cache.invalidate().await))
    }

    /// Display-only node data (title, cover, ...) changed.
    pub async fn after_display_change(&self) -> MaintenanceAction {
        MaintenanceAction::Invalidated(self.cache.invalidate().await)
    }

    async fn recompute(&self) -> CrossoverResult<MaintenanceAction> {
        match self.engine.recompute().await {
            Ok(outcome) if outcome.success => Ok(MaintenanceAction::Recomputed(outcome)),
            Ok(_) => Ok(MaintenanceAction::Invalidated(self.cache.invalidate().await)),
            Err(e) => {
                let version = self.cache.invalidate().await;
                tracing::warn!(error = %e, version, "Level recomputation failed; snapshots invalidated");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for GraphMaintenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphMaintenance")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

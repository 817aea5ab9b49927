//! Crossover Graph - Levels, Snapshots and Mutation Upkeep
//!
//! Edges carry a derived `level`: the shortest hop count over approved
//! edges from the nearest root to the edge's destination.
//! [`LevelGraphEngine::recompute`] rebuilds those levels from scratch.
//! [`SnapshotAssembler`] produces the cached read view around one root and
//! [`GraphMaintenance`] keeps both in step after mutations.

pub mod engine;
pub mod levels;
pub mod maintenance;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use engine::{LevelGraphEngine, RecomputeOutcome};
pub use levels::{compute_levels, group_by_level};
pub use maintenance::{GraphMaintenance, MaintenanceAction};
pub use memory::InMemoryGraphStore;
pub use snapshot::{GraphSnapshot, SnapshotAssembler, SnapshotLink, SnapshotNode};
pub use store::{Adjacency, GraphStore, LevelUpdate, StorageResult};

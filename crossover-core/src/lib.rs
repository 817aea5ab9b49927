//! Crossover Core - Shared Types
//!
//! Graph records, error types, the clock abstraction and runtime
//! configuration. Every other crate in the workspace depends on this one;
//! it carries no I/O of its own.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod graph;

pub use clock::{duration_to_ms, ttl_secs_from_ms, Clock, ManualClock, SystemClock};
pub use config::{CrossoverConfig, KvConfig};
pub use error::{
    BackendError, BackendResult, ConfigError, CrossoverError, CrossoverResult, ProducerError,
    StorageError,
};
pub use graph::{
    EdgeId, EdgeRecord, EvidenceId, EvidenceRecord, EvidenceStatus, LevelMap, NodeId, NodeRecord,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

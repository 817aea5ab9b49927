//! Caching layers.
//!
//! - [`VersionedSnapshotCache`]: get-or-compute keyed by a global version,
//!   invalidated in O(1) by bumping that version.
//! - [`RequestCache`]: plain TTL get-or-set for external call results.
//!
//! Both run on process-local memory and mirror to the optional remote
//! backend when one is configured.

mod read;
mod request;
mod stats;
mod store;
mod versioned;

pub use read::{CacheRead, ReadSource};
pub use request::RequestCache;
pub use stats::CacheStats;
pub use store::SnapshotStore;
pub use versioned::{SnapshotCacheConfig, VersionedSnapshotCache};

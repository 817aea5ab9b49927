//! Crossover Storage - Caches, Rate Limiting and Key/Value Backends
//!
//! Everything here runs against an optional remote key/value store and
//! degrades to process-local state when that store is absent or failing.
//!
//! - [`kv`]: the [`KeyValueBackend`] trait, the Upstash REST client and an
//!   in-memory emulation.
//! - [`cache`]: the versioned snapshot cache and the plain request cache.
//! - [`rate_limit`]: the fixed-window limiter.

pub mod cache;
pub mod kv;
pub mod rate_limit;
mod sweep;

pub use cache::{
    CacheRead, CacheStats, ReadSource, RequestCache, SnapshotCacheConfig, SnapshotStore,
    VersionedSnapshotCache,
};
pub use kv::{backend_from_config, InMemoryBackend, KeyValueBackend, SharedBackend, UpstashBackend};
pub use rate_limit::{LocalWindowStore, RateLimitDecision, RateLimitPolicy, WindowedRateLimiter};

//! Remote key/value backend trait.
//!
//! Mirrors the small slice of Redis that the cache and the rate limiter need.
//! Responses are handed back as raw JSON values: remote stores disagree on
//! whether counters come back as numbers or numeric strings, so callers run
//! them through the helpers in [`super::parse`] instead of trusting a shape.

use async_trait::async_trait;
use crossover_core::BackendResult;
use serde_json::Value;
use std::fmt::Debug;

/// Remote atomic key/value store.
///
/// Implementations must be thread-safe; every method may be awaited
/// concurrently by independent requests. Atomicity of `incr` and of the
/// pipelined `incr_with_expiry` is supplied by the store itself.
#[async_trait]
pub trait KeyValueBackend: Debug + Send + Sync {
    /// Short backend name for log fields.
    fn name(&self) -> &'static str;

    /// `GET key`. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> BackendResult<Option<Value>>;

    /// `SET key value [EX ttl_secs]`.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> BackendResult<()>;

    /// `INCR key`, returning the raw post-increment counter.
    async fn incr(&self, key: &str) -> BackendResult<Value>;

    /// `EXPIRE key ttl_secs`, returning the raw reply (1 when applied).
    async fn expire(&self, key: &str, ttl_secs: u64) -> BackendResult<Value>;

    /// `PTTL key`: remaining lifetime in ms, -1 without expiry, -2 when missing.
    async fn pttl(&self, key: &str) -> BackendResult<Value>;

    /// `MULTI; INCR key; EXPIRE key ttl_secs; EXEC` in one round trip.
    ///
    /// Returns the raw replies in command order. The two commands are applied
    /// as one unit, so a counter is never observed without its expiry.
    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> BackendResult<Vec<Value>>;
}

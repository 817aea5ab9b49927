//! Versioned snapshot cache.
//!
//! Entries are stamped with a global version counter. Invalidation bumps the
//! counter instead of deleting keys: every entry written under an older
//! version simply stops being readable, locally and remotely, and expires on
//! its own TTL.
//!
//! # Consistency model
//!
//! Local memory and the remote store are written best-effort, one after the
//! other, without any two-phase commit. A remote failure leaves this process
//! serving from (and invalidating) its local state only; sibling processes
//! catch up the next time they read the shared version counter. Each process
//! adopts the higher of its local and the remote version before any lookup.
//! A process whose local version ran ahead (its `INCR` failed) raises the
//! remote counter to match, so a sibling's next invalidation lands on a
//! version nobody has used yet. The remote counter never moves backwards on
//! behalf of this process.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crossover_core::constants::{GRAPH_SNAPSHOT_KEY_SUFFIX, GRAPH_VERSION_KEY_SUFFIX};
use crossover_core::{
    duration_to_ms, ttl_secs_from_ms, Clock, CrossoverConfig, CrossoverResult, ProducerError,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::read::CacheRead;
use super::stats::{CacheStats, StatsRecorder};
use super::store::SnapshotStore;
use crate::kv::{parse_version, KeyValueBackend, SharedBackend};
use crate::sweep::SweepGate;

/// Key layout and defaults for one versioned cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCacheConfig {
    /// Remote key holding the shared version counter.
    pub version_key: String,
    /// Prefix of remote entry keys: `{entry_prefix}:{version}:{key}`.
    pub entry_prefix: String,
    /// TTL used by [`VersionedSnapshotCache::get_or_compute_default`].
    pub default_ttl: Duration,
}

impl SnapshotCacheConfig {
    /// Layout used for graph snapshots.
    pub fn graph(config: &CrossoverConfig) -> Self {
        Self {
            version_key: config.namespaced(GRAPH_VERSION_KEY_SUFFIX),
            entry_prefix: config.namespaced(GRAPH_SNAPSHOT_KEY_SUFFIX),
            default_ttl: config.graph_cache_ttl,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn remote_key(&self, version: u64, key: &str) -> String {
        format!("{}:{}:{}", self.entry_prefix, version, key)
    }
}

impl Default for SnapshotCacheConfig {
    fn default() -> Self {
        Self::graph(&CrossoverConfig::default())
    }
}

/// Get-or-compute cache invalidated by version bumps.
///
/// Cloning is cheap and every clone shares the same local store.
pub struct VersionedSnapshotCache<V> {
    store: Arc<SnapshotStore<V>>,
    backend: SharedBackend,
    clock: Arc<dyn Clock>,
    config: SnapshotCacheConfig,
    stats: Arc<StatsRecorder>,
    sweep_gate: Arc<SweepGate>,
}

impl<V> Clone for VersionedSnapshotCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            backend: self.backend.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
            sweep_gate: Arc::clone(&self.sweep_gate),
        }
    }
}

impl<V> VersionedSnapshotCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<SnapshotStore<V>>,
        backend: SharedBackend,
        clock: Arc<dyn Clock>,
        config: SnapshotCacheConfig,
    ) -> Self {
        Self {
            store,
            backend,
            clock,
            config,
            stats: Arc::new(StatsRecorder::default()),
            sweep_gate: Arc::new(SweepGate::default()),
        }
    }

    pub fn config(&self) -> &SnapshotCacheConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore<V> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Resolve the current version.
    ///
    /// With a remote backend the higher of the local and remote counters
    /// wins. A remote counter that is behind, missing or unreadable is set to
    /// the local one. Remote failures fall back to the local version.
    pub async fn current_version(&self) -> u64 {
        let local = self.store.version().await;
        let Some(backend) = self.backend.as_deref() else {
            return local;
        };

        match backend.get(&self.config.version_key).await {
            Ok(raw) => match raw.as_ref().and_then(parse_version) {
                Some(remote) if remote < local => {
                    tracing::info!(local, remote, "Remote cache version lags local; raising it");
                    self.seed_remote_version(backend, local).await;
                    local
                }
                Some(remote) => self.store.adopt(remote).await,
                None => {
                    if raw.is_some() {
                        tracing::warn!(
                            key = %self.config.version_key,
                            "Unparseable remote cache version; reseeding from local"
                        );
                    }
                    self.seed_remote_version(backend, local).await;
                    local
                }
            },
            Err(e) => {
                self.stats.remote_error();
                tracing::warn!(
                    error = %e,
                    backend = backend.name(),
                    "Cache version read failed; using local version"
                );
                local
            }
        }
    }

    /// `SET` the remote counter. Only called with a version ahead of the
    /// last remote value observed.
    async fn seed_remote_version(&self, backend: &dyn KeyValueBackend, version: u64) {
        if let Err(e) = backend
            .set(&self.config.version_key, &version.to_string(), None)
            .await
        {
            self.stats.remote_error();
            tracing::warn!(error = %e, "Failed to seed remote cache version");
        }
    }

    /// Return the cached value for `key` or compute it with `producer`.
    ///
    /// Lookup order is local memory, then the remote store (a remote hit
    /// backfills local memory), then the producer. A produced value is stored
    /// under the version read at the start of this call; if an invalidation
    /// landed while the producer ran, the value is returned but not cached.
    /// Producer errors propagate unchanged and nothing is cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> CrossoverResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CrossoverResult<V>>,
    {
        let version = self.current_version().await;
        let ttl_ms = duration_to_ms(ttl);

        if let Some(value) = self.store.get(version, key, self.clock.now_ms()).await {
            self.stats.local_hit();
            tracing::debug!(key, version, "Snapshot cache hit (local)");
            return Ok(CacheRead::local_hit(value, Some(version)));
        }

        if let Some(value) = self.remote_get(version, key).await {
            let expires_at = self.clock.now_ms().saturating_add(ttl_ms);
            self.store.insert(version, key, value.clone(), expires_at).await;
            self.stats.remote_hit();
            tracing::debug!(key, version, "Snapshot cache hit (remote)");
            return Ok(CacheRead::remote_hit(value, Some(version)));
        }

        self.stats.miss();
        tracing::debug!(key, version, "Snapshot cache miss; running producer");
        let value = producer().await?;

        let now = self.clock.now_ms();
        if self.sweep_gate.due(now) {
            let swept = self.store.purge_expired(now).await;
            if swept > 0 {
                tracing::debug!(swept, "Expired snapshot entries dropped");
            }
        }
        let expires_at = now.saturating_add(ttl_ms);
        if self.store.insert(version, key, value.clone(), expires_at).await {
            self.remote_set(version, key, &value, ttl_ms).await;
        } else {
            tracing::debug!(
                key,
                version,
                "Cache version moved while producing; result not cached"
            );
        }

        Ok(CacheRead::produced(value, Some(version)))
    }

    /// [`get_or_compute`](Self::get_or_compute) with the configured default TTL.
    pub async fn get_or_compute_default<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> CrossoverResult<CacheRead<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CrossoverResult<V>>,
    {
        self.get_or_compute(key, self.config.default_ttl, producer)
            .await
    }

    /// Invalidate every cached snapshot by bumping the version.
    ///
    /// The local bump (and the clearing of local entries) always takes
    /// effect. The remote increment is best-effort; when it succeeds, the
    /// returned counter is adopted if it is ahead of the local one, and
    /// raised to the local one if it is behind.
    pub async fn invalidate(&self) -> u64 {
        self.current_version().await;
        let bumped = self.store.bump().await;
        self.stats.invalidation();

        let Some(backend) = self.backend.as_deref() else {
            tracing::info!(version = bumped, "Snapshot cache invalidated (local)");
            return bumped;
        };

        match backend.incr(&self.config.version_key).await {
            Ok(raw) => match parse_version(&raw) {
                Some(remote) if remote < bumped => {
                    self.seed_remote_version(backend, bumped).await;
                    tracing::info!(
                        version = bumped,
                        remote,
                        "Snapshot cache invalidated; remote version raised"
                    );
                    bumped
                }
                Some(remote) => {
                    let version = self.store.adopt(remote).await;
                    tracing::info!(version, "Snapshot cache invalidated");
                    version
                }
                None => {
                    self.stats.remote_error();
                    tracing::warn!(
                        reply = %raw,
                        "Malformed reply to version increment; local cache invalidated only"
                    );
                    bumped
                }
            },
            Err(e) => {
                self.stats.remote_error();
                tracing::warn!(
                    error = %e,
                    backend = backend.name(),
                    "Remote cache invalidation failed; local cache invalidated only"
                );
                bumped
            }
        }
    }

    async fn remote_get(&self, version: u64, key: &str) -> Option<V> {
        let backend = self.backend.as_deref()?;
        let remote_key = self.config.remote_key(version, key);

        let raw = match backend.get(&remote_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.stats.remote_error();
                tracing::warn!(
                    error = %e,
                    key = %remote_key,
                    "Snapshot cache get failed; falling back to local cache"
                );
                return None;
            }
        };

        match decode_remote(raw) {
            Ok(value) => Some(value),
            Err(reason) => {
                tracing::warn!(key = %remote_key, reason, "Discarding undecodable remote snapshot");
                None
            }
        }
    }

    async fn remote_set(&self, version: u64, key: &str, value: &V, ttl_ms: i64) {
        let Some(backend) = self.backend.as_deref() else {
            return;
        };
        let remote_key = self.config.remote_key(version, key);

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                let err = ProducerError::Serialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Snapshot not mirrored remotely");
                return;
            }
        };

        if let Err(e) = backend
            .set(&remote_key, &payload, Some(ttl_secs_from_ms(ttl_ms)))
            .await
        {
            self.stats.remote_error();
            tracing::warn!(
                error = %e,
                key = %remote_key,
                "Snapshot cache set failed; using local cache only"
            );
        }
    }
}

/// Decode a remote reply. Stores hand back JSON text; some clients decode it
/// eagerly, so structured values are accepted too.
pub(crate) fn decode_remote<T: DeserializeOwned>(raw: Value) -> Result<T, String> {
    match raw {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| e.to_string()),
        other => serde_json::from_value(other).map_err(|e| e.to_string()),
    }
}

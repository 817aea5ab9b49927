//! Plain TTL cache for deduplicating expensive external calls.
//!
//! Unlike the snapshot cache there is no versioning: entries live until
//! their TTL runs out. The remote store is consulted first so that sibling
//! processes share results.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crossover_core::constants::REQUEST_CACHE_KEY_SUFFIX;
use crossover_core::{
    duration_to_ms, ttl_secs_from_ms, Clock, CrossoverConfig, CrossoverResult, ProducerError,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::read::CacheRead;
use super::stats::{CacheStats, StatsRecorder};
use super::store::LocalEntry;
use super::versioned::decode_remote;
use crate::kv::SharedBackend;
use crate::sweep::SweepGate;

/// Get-or-set cache of JSON-serializable values.
pub struct RequestCache {
    local: RwLock<HashMap<String, LocalEntry<Value>>>,
    backend: SharedBackend,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    stats: StatsRecorder,
    sweep_gate: SweepGate,
}

impl RequestCache {
    pub fn new(backend: SharedBackend, clock: Arc<dyn Clock>, config: &CrossoverConfig) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            backend,
            clock,
            key_prefix: config.namespaced(REQUEST_CACHE_KEY_SUFFIX),
            stats: StatsRecorder::default(),
            sweep_gate: SweepGate::default(),
        }
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of locally held entries, expired ones not yet swept included.
    pub async fn local_len(&self) -> usize {
        self.local.read().await.len()
    }

    /// Look `key` up, remote first, then local memory.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheRead<T>> {
        if let Some(value) = self.remote_get(key).await {
            self.stats.remote_hit();
            return Some(CacheRead::remote_hit(value, None));
        }

        let now = self.clock.now_ms();
        let raw = {
            let local = self.local.read().await;
            match local.get(key) {
                Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
                _ => None,
            }
        };

        match raw.map(serde_json::from_value::<T>) {
            Some(Ok(value)) => {
                self.stats.local_hit();
                Some(CacheRead::local_hit(value, None))
            }
            Some(Err(e)) => {
                tracing::warn!(key, error = %e, "Cached value has unexpected shape");
                None
            }
            None => {
                self.evict_expired(key, now).await;
                None
            }
        }
    }

    /// Store `value` locally, then remotely. A serialization failure is
    /// returned; a remote failure is only logged.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CrossoverResult<()> {
        let json = serde_json::to_value(value).map_err(|e| ProducerError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let ttl_ms = duration_to_ms(ttl);
        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(ttl_ms);
        let payload = json.to_string();

        {
            let mut local = self.local.write().await;
            if self.sweep_gate.due(now) {
                let before = local.len();
                local.retain(|_, entry| entry.is_live(now));
                let swept = before - local.len();
                if swept > 0 {
                    tracing::debug!(swept, "Expired request cache entries dropped");
                }
            }
            local.insert(key.to_string(), LocalEntry::new(json, expires_at));
        }

        if let Some(backend) = self.backend.as_deref() {
            let remote_key = self.remote_key(key);
            if let Err(e) = backend
                .set(&remote_key, &payload, Some(ttl_secs_from_ms(ttl_ms)))
                .await
            {
                self.stats.remote_error();
                tracing::warn!(error = %e, key = %remote_key, "Request cache set failed");
            }
        }
        Ok(())
    }

    /// Return the cached value or produce, store and return a fresh one.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
    ) -> CrossoverResult<CacheRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CrossoverResult<T>>,
    {
        if let Some(read) = self.get(key).await {
            return Ok(read);
        }
        self.stats.miss();
        let value = producer().await?;
        self.set(key, &value, ttl).await?;
        Ok(CacheRead::produced(value, None))
    }

    async fn remote_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_deref()?;
        let remote_key = self.remote_key(key);
        match backend.get(&remote_key).await {
            Ok(Some(raw)) => match decode_remote(raw) {
                Ok(value) => Some(value),
                Err(reason) => {
                    tracing::warn!(key = %remote_key, reason, "Discarding undecodable cached value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.stats.remote_error();
                tracing::warn!(error = %e, key = %remote_key, "Request cache get failed");
                None
            }
        }
    }

    async fn evict_expired(&self, key: &str, now_ms: i64) {
        let mut local = self.local.write().await;
        if local.get(key).is_some_and(|entry| !entry.is_live(now_ms)) {
            local.remove(key);
        }
    }
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("key_prefix", &self.key_prefix)
            .field("remote", &self.backend.is_some())
            .finish()
    }
}

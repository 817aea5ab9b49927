//! In-process key/value backend with Redis semantics.
//!
//! Behaves like the remote store as far as the cache and the rate limiter can
//! observe (string values, integer counters, second-granularity expiry, PTTL
//! sentinels) but runs on the injected [`Clock`], so tests can drive window
//! rollover and TTL expiry without sleeping.

use async_trait::async_trait;
use crossover_core::{BackendError, BackendResult, Clock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::KeyValueBackend;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at_ms: Option<i64>,
}

impl MemoryEntry {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.map_or(true, |at| at > now_ms)
    }
}

/// Redis-like store held in process memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = self.clock.now_ms();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Live keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = self.clock.now_ms();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    fn incr_locked(
        entries: &mut HashMap<String, MemoryEntry>,
        key: &str,
        now_ms: i64,
    ) -> BackendResult<i64> {
        let current = match entries.get(key) {
            Some(entry) if entry.is_live(now_ms) => {
                let parsed = entry.value.parse::<i64>().map_err(|_| {
                    BackendError::CommandFailed {
                        command: "INCR".to_string(),
                        message: "ERR value is not an integer or out of range".to_string(),
                    }
                })?;
                Some((parsed, entry.expires_at_ms))
            }
            _ => None,
        };

        let (next, expires_at_ms) = match current {
            Some((value, expires_at_ms)) => {
                let next = value
                    .checked_add(1)
                    .ok_or_else(|| BackendError::CommandFailed {
                        command: "INCR".to_string(),
                        message: "ERR increment or decrement would overflow".to_string(),
                    })?;
                (next, expires_at_ms)
            }
            None => (1, None),
        };

        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: next.to_string(),
                expires_at_ms,
            },
        );
        Ok(next)
    }

    fn expire_locked(
        entries: &mut HashMap<String, MemoryEntry>,
        key: &str,
        ttl_secs: u64,
        now_ms: i64,
    ) -> i64 {
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now_ms) => {
                let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                entry.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
                1
            }
            _ => 0,
        }
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> BackendResult<Option<Value>> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(Value::String(entry.value.clone()))),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> BackendResult<()> {
        let now = self.clock.now_ms();
        let expires_at_ms = ttl_secs.map(|secs| {
            let ttl_ms = i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
            now.saturating_add(ttl_ms)
        });
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> BackendResult<Value> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;
        Self::incr_locked(&mut entries, key, now).map(|v| json!(v))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> BackendResult<Value> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;
        Ok(json!(Self::expire_locked(&mut entries, key, ttl_secs, now)))
    }

    async fn pttl(&self, key: &str) -> BackendResult<Value> {
        let now = self.clock.now_ms();
        let entries = self.entries.lock().await;
        let ttl = match entries.get(key) {
            Some(entry) if entry.is_live(now) => match entry.expires_at_ms {
                Some(at) => at - now,
                None => -1,
            },
            _ => -2,
        };
        Ok(json!(ttl))
    }

    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> BackendResult<Vec<Value>> {
        let now = self.clock.now_ms();
        // One lock for both commands: MULTI/EXEC.
        let mut entries = self.entries.lock().await;
        let count = Self::incr_locked(&mut entries, key, now)?;
        let applied = Self::expire_locked(&mut entries, key, ttl_secs, now);
        Ok(vec![json!(count), json!(applied)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossover_core::ManualClock;
    use std::time::Duration;

    fn backend() -> (Arc<ManualClock>, InMemoryBackend) {
        let clock = Arc::new(ManualClock::new(1_000));
        let backend = InMemoryBackend::new(clock.clone());
        (clock, backend)
    }

    #[tokio::test]
    async fn test_get_set_roundtrip_and_expiry() {
        let (clock, backend) = backend();
        backend.set("k", "v", Some(2)).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!("v")));

        clock.advance(Duration::from_millis(2_000));
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_starts_at_one_and_keeps_ttl() {
        let (_clock, backend) = backend();
        assert_eq!(backend.incr("c").await.unwrap(), json!(1));
        backend.expire("c", 10).await.unwrap();
        assert_eq!(backend.incr("c").await.unwrap(), json!(2));
        assert_eq!(backend.pttl("c").await.unwrap(), json!(10_000));
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let (_clock, backend) = backend();
        backend.set("c", "snapshot", None).await.unwrap();
        let err = backend.incr("c").await.unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_incr_overflow_is_an_error() {
        let (_clock, backend) = backend();
        backend.set("c", &i64::MAX.to_string(), None).await.unwrap();
        let err = backend.incr("c").await.unwrap_err();
        assert!(
            matches!(err, BackendError::CommandFailed { ref message, .. } if message.contains("overflow"))
        );
        assert_eq!(
            backend.get("c").await.unwrap(),
            Some(Value::String(i64::MAX.to_string()))
        );
    }

    #[tokio::test]
    async fn test_pttl_sentinels() {
        let (_clock, backend) = backend();
        assert_eq!(backend.pttl("missing").await.unwrap(), json!(-2));
        backend.set("forever", "1", None).await.unwrap();
        assert_eq!(backend.pttl("forever").await.unwrap(), json!(-1));
    }

    #[tokio::test]
    async fn test_incr_with_expiry_sets_both() {
        let (clock, backend) = backend();
        let replies = backend.incr_with_expiry("bucket", 60).await.unwrap();
        assert_eq!(replies, vec![json!(1), json!(1)]);

        clock.advance(Duration::from_secs(30));
        let replies = backend.incr_with_expiry("bucket", 60).await.unwrap();
        assert_eq!(replies[0], json!(2));
        assert_eq!(backend.pttl("bucket").await.unwrap(), json!(60_000));

        clock.advance(Duration::from_secs(61));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_keys_with_prefix() {
        let (_clock, backend) = backend();
        backend.set("ct:graph:snapshot:1:a", "{}", None).await.unwrap();
        backend.set("ct:graph:snapshot:1:b", "{}", None).await.unwrap();
        backend.set("ct:graph:version", "1", None).await.unwrap();
        assert_eq!(
            backend.keys_with_prefix("ct:graph:snapshot").await,
            vec!["ct:graph:snapshot:1:a", "ct:graph:snapshot:1:b"]
        );
    }
}

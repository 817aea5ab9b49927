//! Fixed-window rate limiting.
//!
//! With a remote backend every process shares one counter per
//! `(key, window)` bucket: the bucket name embeds the window index, so a
//! new window starts from zero without any reset step. Without a backend,
//! or when a remote call fails, the decision is made on the process-local
//! [`LocalWindowStore`] instead.

mod local;

use std::sync::Arc;
use std::time::Duration;

use crossover_core::constants::{
    ADMIN_LOGIN_LIMIT, ADMIN_LOGIN_WINDOW_MS, AI_SEARCH_LIMIT, AI_SEARCH_WINDOW_MS,
    RATE_LIMIT_KEY_SUFFIX,
};
use crossover_core::{
    duration_to_ms, ttl_secs_from_ms, BackendError, BackendResult, Clock, CrossoverConfig,
};

use crate::kv::{parse_counter, parse_pttl_ms, KeyValueBackend, SharedBackend};

pub use local::LocalWindowStore;

/// Outcome of one `consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Milliseconds until the window resets. Zero when allowed.
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    pub fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_ms: 0,
        }
    }

    pub fn deny(retry_after_ms: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_ms,
        }
    }

    /// Whole seconds to wait, rounded up, for a `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }
}

/// A named limit applied to one class of callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(name: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
        }
    }

    /// External AI search: 40 per 10 minutes.
    pub const fn ai_search() -> Self {
        Self::new(
            "ai-search",
            AI_SEARCH_LIMIT,
            Duration::from_millis(AI_SEARCH_WINDOW_MS),
        )
    }

    /// Admin login attempts: 20 per 10 minutes.
    pub const fn admin_login() -> Self {
        Self::new(
            "admin-login",
            ADMIN_LOGIN_LIMIT,
            Duration::from_millis(ADMIN_LOGIN_WINDOW_MS),
        )
    }

    /// Limiter key for `client` under this policy.
    pub fn key_for(&self, client: &str) -> String {
        format!("{}:{}", self.name, client)
    }
}

/// Fixed-window limiter over the optional remote backend.
#[derive(Clone)]
pub struct WindowedRateLimiter {
    backend: SharedBackend,
    local: Arc<LocalWindowStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl WindowedRateLimiter {
    pub fn new(
        backend: SharedBackend,
        local: Arc<LocalWindowStore>,
        clock: Arc<dyn Clock>,
        config: &CrossoverConfig,
    ) -> Self {
        Self {
            backend,
            local,
            clock,
            key_prefix: config.namespaced(RATE_LIMIT_KEY_SUFFIX),
        }
    }

    pub fn local_store(&self) -> &LocalWindowStore {
        &self.local
    }

    /// Count one request for `key` against `limit` per `window`.
    ///
    /// A zero limit denies every call for a full window without counting.
    /// Windows shorter than a millisecond are treated as one millisecond.
    pub async fn consume(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let window_ms = duration_to_ms(window).max(1);

        if limit == 0 {
            return RateLimitDecision::deny(window_ms as u64);
        }

        let now = self.clock.now_ms();

        if let Some(backend) = self.backend.as_deref() {
            match self.consume_remote(backend, key, limit, window_ms, now).await {
                Ok(decision) => return decision,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        key,
                        backend = backend.name(),
                        "Remote rate limit failed; using local window"
                    );
                }
            }
        }

        let decision = self.local.consume(key, limit, window_ms, now);
        if !decision.allowed {
            tracing::debug!(key, retry_after_ms = decision.retry_after_ms, "Rate limited (local)");
        }
        decision
    }

    pub async fn consume_policy(&self, policy: &RateLimitPolicy, client: &str) -> RateLimitDecision {
        self.consume(&policy.key_for(client), policy.limit, policy.window)
            .await
    }

    fn bucket_key(&self, key: &str, window_ms: i64, now_ms: i64) -> String {
        format!(
            "{}:{}#{}",
            self.key_prefix,
            key,
            now_ms.div_euclid(window_ms)
        )
    }

    async fn consume_remote(
        &self,
        backend: &dyn KeyValueBackend,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> BackendResult<RateLimitDecision> {
        let bucket = self.bucket_key(key, window_ms, now_ms);
        let replies = backend
            .incr_with_expiry(&bucket, ttl_secs_from_ms(window_ms))
            .await?;

        let count = replies
            .first()
            .and_then(parse_counter)
            .ok_or_else(|| BackendError::MalformedResponse {
                command: "INCR".to_string(),
                reason: format!("expected a positive counter, got {:?}", replies.first()),
            })?;

        if count > u64::from(limit) {
            let retry_after_ms = match backend.pttl(&bucket).await {
                Ok(raw) => parse_pttl_ms(&raw),
                Err(e) => {
                    tracing::warn!(error = %e, bucket = %bucket, "PTTL failed; assuming full window");
                    None
                }
            }
            .unwrap_or(window_ms as u64);

            tracing::debug!(key, count, retry_after_ms, "Rate limited");
            return Ok(RateLimitDecision::deny(retry_after_ms));
        }

        // count <= limit here, so the difference fits in u32.
        let remaining = u32::try_from(u64::from(limit) - count).unwrap_or(0);
        Ok(RateLimitDecision::allow(remaining))
    }
}

impl std::fmt::Debug for WindowedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedRateLimiter")
            .field("key_prefix", &self.key_prefix)
            .field("remote", &self.backend.is_some())
            .field("local_windows", &self.local.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryBackend;
    use async_trait::async_trait;
    use crossover_core::ManualClock;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    const MINUTE: Duration = Duration::from_secs(60);

    #[derive(Debug)]
    struct UnreachableBackend;

    #[async_trait]
    impl KeyValueBackend for UnreachableBackend {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn get(&self, _key: &str) -> BackendResult<Option<Value>> {
            Err(refused())
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> BackendResult<()> {
            Err(refused())
        }

        async fn incr(&self, _key: &str) -> BackendResult<Value> {
            Err(refused())
        }

        async fn expire(&self, _key: &str, _ttl: u64) -> BackendResult<Value> {
            Err(refused())
        }

        async fn pttl(&self, _key: &str) -> BackendResult<Value> {
            Err(refused())
        }

        async fn incr_with_expiry(&self, _key: &str, _ttl: u64) -> BackendResult<Vec<Value>> {
            Err(refused())
        }
    }

    fn refused() -> BackendError {
        BackendError::Status {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }

    /// Backend whose counter reply cannot be parsed.
    #[derive(Debug)]
    struct GarbledBackend;

    #[async_trait]
    impl KeyValueBackend for GarbledBackend {
        fn name(&self) -> &'static str {
            "garbled"
        }

        async fn get(&self, _key: &str) -> BackendResult<Option<Value>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> BackendResult<()> {
            Ok(())
        }

        async fn incr(&self, _key: &str) -> BackendResult<Value> {
            Ok(json!("OK"))
        }

        async fn expire(&self, _key: &str, _ttl: u64) -> BackendResult<Value> {
            Ok(json!(1))
        }

        async fn pttl(&self, _key: &str) -> BackendResult<Value> {
            Ok(json!(-1))
        }

        async fn incr_with_expiry(&self, _key: &str, _ttl: u64) -> BackendResult<Vec<Value>> {
            Ok(vec![json!("OK"), json!(1)])
        }
    }

    fn limiter(clock: Arc<ManualClock>, backend: SharedBackend) -> WindowedRateLimiter {
        WindowedRateLimiter::new(
            backend,
            Arc::new(LocalWindowStore::new()),
            clock,
            &CrossoverConfig::new(),
        )
    }

    fn remote(clock: &Arc<ManualClock>) -> SharedBackend {
        Some(Arc::new(InMemoryBackend::new(clock.clone())))
    }

    async fn assert_reference_case(limiter: &WindowedRateLimiter, clock: &ManualClock) {
        let first = limiter.consume("ip:10.0.0.1", 2, MINUTE).await;
        assert_eq!(first, RateLimitDecision::allow(1));

        let second = limiter.consume("ip:10.0.0.1", 2, MINUTE).await;
        assert_eq!(second, RateLimitDecision::allow(0));

        let third = limiter.consume("ip:10.0.0.1", 2, MINUTE).await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert!(third.retry_after_ms > 0);
        assert!(third.retry_after_ms <= 60_000);

        clock.advance(MINUTE);
        let fresh = limiter.consume("ip:10.0.0.1", 2, MINUTE).await;
        assert_eq!(fresh, RateLimitDecision::allow(1));
    }

    #[tokio::test]
    async fn test_reference_case_local() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone(), None);
        assert_reference_case(&limiter, &clock).await;
    }

    #[tokio::test]
    async fn test_reference_case_remote() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone(), remote(&clock));
        assert_reference_case(&limiter, &clock).await;
        assert!(limiter.local_store().is_empty());
    }

    #[tokio::test]
    async fn test_reference_case_with_failing_remote() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone(), Some(Arc::new(UnreachableBackend)));
        assert_reference_case(&limiter, &clock).await;
    }

    #[tokio::test]
    async fn test_malformed_counter_falls_back_to_local() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock, Some(Arc::new(GarbledBackend)));
        assert!(limiter.consume("k", 1, MINUTE).await.allowed);
        assert!(!limiter.consume("k", 1, MINUTE).await.allowed);
        assert_eq!(limiter.local_store().count("k"), Some(1));
    }

    #[tokio::test]
    async fn test_remote_retry_after_uses_pttl() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone(), remote(&clock));

        limiter.consume("k", 1, MINUTE).await;
        clock.advance(Duration::from_secs(15));
        let denied = limiter.consume("k", 1, MINUTE).await;

        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_ms, 45_000);
        assert_eq!(denied.retry_after_secs(), 45);
    }

    #[tokio::test]
    async fn test_remote_bucket_key_embeds_window_index() {
        let clock = Arc::new(ManualClock::new(125_000));
        let memory = Arc::new(InMemoryBackend::new(clock.clone()));
        let backend: Arc<dyn KeyValueBackend> = memory.clone();
        let limiter = limiter(clock, Some(backend));

        limiter
            .consume_policy(&RateLimitPolicy::admin_login(), "10.0.0.9")
            .await;

        assert_eq!(
            memory.keys_with_prefix("ct:rl:").await,
            vec!["ct:rl:admin-login:10.0.0.9#0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zero_limit_always_denies() {
        let clock = Arc::new(ManualClock::new(0));
        for backend in [None, remote(&clock)] {
            let limiter = limiter(clock.clone(), backend);
            let decision = limiter.consume("k", 0, MINUTE).await;
            assert_eq!(decision, RateLimitDecision::deny(60_000));
            assert!(limiter.local_store().is_empty());
        }
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        assert_eq!(RateLimitDecision::deny(1).retry_after_secs(), 1);
        assert_eq!(RateLimitDecision::deny(1_000).retry_after_secs(), 1);
        assert_eq!(RateLimitDecision::deny(1_001).retry_after_secs(), 2);
        assert_eq!(RateLimitDecision::allow(3).retry_after_secs(), 0);
    }

    #[test]
    fn test_presets() {
        let ai = RateLimitPolicy::ai_search();
        assert_eq!(ai.limit, 40);
        assert_eq!(ai.window, Duration::from_secs(600));
        assert_eq!(ai.key_for("1.2.3.4"), "ai-search:1.2.3.4");
        assert_eq!(RateLimitPolicy::admin_login().limit, 20);
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    proptest! {
        #[test]
        fn prop_nth_call_allowed_next_denied(limit in 1u32..30, remote_path in any::<bool>(), failing in any::<bool>()) {
            runtime().block_on(async {
                let clock = Arc::new(ManualClock::new(0));
                let backend: SharedBackend = match (remote_path, failing) {
                    (false, _) => None,
                    (true, false) => remote(&clock),
                    (true, true) => Some(Arc::new(UnreachableBackend)),
                };
                let limiter = limiter(clock.clone(), backend);

                for i in 1..=limit {
                    let decision = limiter.consume("client", limit, MINUTE).await;
                    prop_assert!(decision.allowed);
                    prop_assert_eq!(decision.remaining, limit - i);
                }
                let over = limiter.consume("client", limit, MINUTE).await;
                prop_assert!(!over.allowed);
                prop_assert!(over.retry_after_ms > 0);

                clock.advance(MINUTE);
                prop_assert!(limiter.consume("client", limit, MINUTE).await.allowed);
                Ok(())
            })?;
        }
    }
}

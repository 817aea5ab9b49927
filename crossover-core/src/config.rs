//! Configuration Module
//!
//! Runtime settings for the remote key/value backend, key namespacing and
//! cache TTLs. Loaded from environment variables with sensible defaults; a
//! missing remote backend is a supported configuration, not an error.

use std::time::Duration;

use crate::constants::{
    DEFAULT_GRAPH_CACHE_TTL_MS, DEFAULT_KEY_PREFIX, DEFAULT_KV_TIMEOUT_MS, UPSTASH_TOKEN_ENV,
    UPSTASH_URL_ENV,
};
use crate::error::ConfigError;

// ============================================================================
// REMOTE KEY/VALUE CONFIGURATION
// ============================================================================

/// Connection settings for the remote key/value store (Upstash REST).
#[derive(Clone, PartialEq, Eq)]
pub struct KvConfig {
    /// REST endpoint, e.g. `https://eu1-proud-cat-12345.upstash.io`.
    pub url: String,
    /// Bearer token sent with every command.
    pub token: String,
    /// Timeout for a single HTTP round trip.
    pub timeout: Duration,
}

impl KvConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            timeout: Duration::from_millis(DEFAULT_KV_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject endpoints that cannot possibly be a REST URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: UPSTASH_TOKEN_ENV.to_string(),
            });
        }
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: UPSTASH_URL_ENV.to_string(),
                value: self.url.clone(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "CROSSOVER_KV_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        Ok(())
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for KvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// TOP-LEVEL CONFIGURATION
// ============================================================================

/// Crossover runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossoverConfig {
    /// Remote backend settings; `None` means local-only mode.
    pub kv: Option<KvConfig>,
    /// Namespace prepended to every remote key.
    pub key_prefix: String,
    /// Default TTL for graph snapshots.
    pub graph_cache_ttl: Duration,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            kv: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            graph_cache_ttl: Duration::from_millis(DEFAULT_GRAPH_CACHE_TTL_MS as u64),
        }
    }
}

impl CrossoverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CrossoverConfig from environment variables.
    ///
    /// Environment variables:
    /// - `UPSTASH_REDIS_REST_URL` / `UPSTASH_REDIS_REST_TOKEN`: both required
    ///   to enable the remote backend
    /// - `CROSSOVER_KV_TIMEOUT_MS`: HTTP timeout per remote call (default: 2000)
    /// - `CROSSOVER_KEY_PREFIX`: remote key namespace (default: "ct")
    /// - `CROSSOVER_GRAPH_CACHE_TTL_MS`: snapshot TTL (default: 60000)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timeout_ms = non_empty("CROSSOVER_KV_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_KV_TIMEOUT_MS);

        let kv = match (non_empty(UPSTASH_URL_ENV), non_empty(UPSTASH_TOKEN_ENV)) {
            (Some(url), Some(token)) => Some(
                KvConfig::new(url.trim(), token.trim())
                    .with_timeout(Duration::from_millis(timeout_ms)),
            ),
            _ => None,
        };

        let key_prefix = non_empty("CROSSOVER_KEY_PREFIX")
            .map(|s| s.trim().trim_end_matches(':').to_string())
            .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());

        let graph_cache_ttl_ms = non_empty("CROSSOVER_GRAPH_CACHE_TTL_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_GRAPH_CACHE_TTL_MS as u64);

        Self {
            kv,
            key_prefix,
            graph_cache_ttl: Duration::from_millis(graph_cache_ttl_ms),
        }
    }

    pub fn with_kv(mut self, kv: KvConfig) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_graph_cache_ttl(mut self, ttl: Duration) -> Self {
        self.graph_cache_ttl = ttl;
        self
    }

    /// Whether a remote backend is configured.
    pub fn is_remote_configured(&self) -> bool {
        self.kv.is_some()
    }

    /// Build a namespaced remote key: `{prefix}:{suffix}`.
    pub fn namespaced(&self, suffix: &str) -> String {
        format!("{}:{}", self.key_prefix, suffix)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "CROSSOVER_KEY_PREFIX".to_string(),
                value: String::new(),
                reason: "prefix must not be empty".to_string(),
            });
        }
        if let Some(kv) = &self.kv {
            kv.validate()?;
        }
        Ok(())
    }
}

//! Constants for Crossover
//!
//! Key namespaces, default TTLs and rate-limit presets shared by every crate.

// ============================================================================
// KEY NAMESPACES
// ============================================================================

/// Default prefix for every remote key.
pub const DEFAULT_KEY_PREFIX: &str = "ct";

/// Suffix of the shared graph snapshot version counter (`{prefix}:graph:version`).
pub const GRAPH_VERSION_KEY_SUFFIX: &str = "graph:version";

/// Suffix of versioned graph snapshot keys (`{prefix}:graph:snapshot:{version}:{key}`).
pub const GRAPH_SNAPSHOT_KEY_SUFFIX: &str = "graph:snapshot";

/// Suffix of request cache keys (`{prefix}:cache:{key}`).
pub const REQUEST_CACHE_KEY_SUFFIX: &str = "cache";

/// Suffix of rate-limit bucket keys (`{prefix}:rl:{key}#{bucket}`).
pub const RATE_LIMIT_KEY_SUFFIX: &str = "rl";

// ============================================================================
// CACHE
// ============================================================================

/// Default TTL for graph snapshots (60 seconds).
pub const DEFAULT_GRAPH_CACHE_TTL_MS: i64 = 60 * 1000;

/// Version every fresh snapshot store starts at.
pub const INITIAL_CACHE_VERSION: u64 = 1;

/// Minimum gap between full sweeps of expired process-local entries.
pub const LOCAL_SWEEP_INTERVAL_MS: i64 = 1_000;

// ============================================================================
// REMOTE BACKEND
// ============================================================================

/// Environment variable holding the Upstash REST endpoint.
pub const UPSTASH_URL_ENV: &str = "UPSTASH_REDIS_REST_URL";

/// Environment variable holding the Upstash REST bearer token.
pub const UPSTASH_TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";

/// Default HTTP timeout for a single remote call.
pub const DEFAULT_KV_TIMEOUT_MS: u64 = 2_000;

// ============================================================================
// GRAPH
// ============================================================================

/// Maximum hop distance included in an assembled graph snapshot.
pub const MAX_SNAPSHOT_DEPTH: u32 = 5;

// ============================================================================
// RATE LIMITING
// ============================================================================

/// AI search requests allowed per client per window.
pub const AI_SEARCH_LIMIT: u32 = 40;

/// AI search window (10 minutes).
pub const AI_SEARCH_WINDOW_MS: u64 = 10 * 60 * 1000;

/// Admin login attempts allowed per client per window.
pub const ADMIN_LOGIN_LIMIT: u32 = 20;

/// Admin login window (10 minutes).
pub const ADMIN_LOGIN_WINDOW_MS: u64 = 10 * 60 * 1000;

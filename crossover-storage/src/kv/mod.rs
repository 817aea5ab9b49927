//! Remote key/value backend shim.
//!
//! The remote store is optional. [`backend_from_config`] returns `None` when
//! no store is configured (or the client cannot be built) and every consumer
//! then runs on its process-local state alone.

pub mod memory;
pub mod parse;
pub mod traits;
pub mod upstash;

use std::sync::Arc;

use crossover_core::CrossoverConfig;

pub use memory::InMemoryBackend;
pub use parse::{parse_counter, parse_integer, parse_pttl_ms, parse_version};
pub use traits::KeyValueBackend;
pub use upstash::UpstashBackend;

/// Shared handle to an optional remote backend.
pub type SharedBackend = Option<Arc<dyn KeyValueBackend>>;

/// Detect the remote backend from configuration.
///
/// Never fails: a missing or invalid configuration is logged and yields
/// local-only mode.
pub fn backend_from_config(config: &CrossoverConfig) -> SharedBackend {
    let kv = config.kv.as_ref()?;

    if let Err(e) = kv.validate() {
        tracing::warn!(error = %e, "Remote key/value config rejected; running local-only");
        return None;
    }

    match UpstashBackend::new(kv) {
        Ok(backend) => {
            tracing::info!(url = %kv.url, "Remote key/value backend enabled");
            Some(Arc::new(backend))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build remote key/value client; running local-only");
            None
        }
    }
}

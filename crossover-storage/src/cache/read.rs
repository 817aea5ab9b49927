//! Result wrapper for cache reads.

/// Where a cache read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Process-local memory.
    Local,
    /// Remote key/value store (local memory was backfilled).
    Remote,
    /// Freshly produced on a full miss.
    Producer,
}

/// Result of a get-or-compute call: the value plus whether it was a hit.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    source: ReadSource,
    /// Cache version the value belongs to; `None` for unversioned caches.
    version: Option<u64>,
}

impl<T> CacheRead<T> {
    pub fn local_hit(value: T, version: Option<u64>) -> Self {
        Self {
            value,
            source: ReadSource::Local,
            version,
        }
    }

    pub fn remote_hit(value: T, version: Option<u64>) -> Self {
        Self {
            value,
            source: ReadSource::Remote,
            version,
        }
    }

    pub fn produced(value: T, version: Option<u64>) -> Self {
        Self {
            value,
            source: ReadSource::Producer,
            version,
        }
    }

    /// True for local and remote hits.
    pub fn hit(&self) -> bool {
        !matches!(self.source, ReadSource::Producer)
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Split into `(value, hit)`.
    pub fn into_parts(self) -> (T, bool) {
        let hit = self.hit();
        (self.value, hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_flags() {
        assert!(CacheRead::local_hit(1, Some(1)).hit());
        assert!(CacheRead::remote_hit(1, Some(1)).hit());
        assert!(!CacheRead::produced(1, Some(1)).hit());
    }

    #[test]
    fn test_into_parts() {
        let (value, hit) = CacheRead::remote_hit("snapshot", None).into_parts();
        assert_eq!(value, "snapshot");
        assert!(hit);
    }
}

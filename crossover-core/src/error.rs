//! Error types for Crossover operations

use thiserror::Error;

/// Graph store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    #[error("Edge not found: {id}")]
    EdgeNotFound { id: String },

    #[error("Evidence not found: {id}")]
    EvidenceNotFound { id: String },

    #[error("Duplicate edge {from} -> {to} ({kind})")]
    DuplicateEdge {
        from: String,
        to: String,
        kind: String,
    },

    #[error("Read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Remote key/value backend errors.
///
/// These never escape the cache or the rate limiter; both downgrade to their
/// process-local state when a backend call fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport failure talking to {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Remote store answered with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Remote store rejected {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Malformed response for {command}: {reason}")]
    MalformedResponse { command: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Failure raised by a user-supplied producer (snapshot assembly, external
/// search, ...). The cache never retries it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProducerError {
    #[error("Producer for {key} failed: {reason}")]
    Failed { key: String, reason: String },

    #[error("Value for {key} could not be serialized: {reason}")]
    Serialization { key: String, reason: String },
}

/// Master error type for all Crossover errors.
#[derive(Debug, Clone, Error)]
pub enum CrossoverError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),
}

/// Result type alias for Crossover operations.
pub type CrossoverResult<T> = Result<T, CrossoverError>;

/// Result type alias for remote key/value calls.
pub type BackendResult<T> = Result<T, BackendError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_duplicate_edge() {
        let err = StorageError::DuplicateEdge {
            from: "a".to_string(),
            to: "b".to_string(),
            kind: "adaptation".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Duplicate edge"));
        assert!(msg.contains("a -> b"));
        assert!(msg.contains("adaptation"));
    }

    #[test]
    fn test_backend_error_display_status() {
        let err = BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "CROSSOVER_KV_TIMEOUT_MS".to_string(),
            value: "soon".to_string(),
            reason: "must be an integer".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("CROSSOVER_KV_TIMEOUT_MS"));
        assert!(msg.contains("soon"));
        assert!(msg.contains("must be an integer"));
    }

    #[test]
    fn test_crossover_error_from_variants() {
        let storage = CrossoverError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, CrossoverError::Storage(_)));

        let backend = CrossoverError::from(BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert!(matches!(backend, CrossoverError::Backend(_)));

        let config = CrossoverError::from(ConfigError::MissingRequired {
            field: "UPSTASH_REDIS_REST_TOKEN".to_string(),
        });
        assert!(matches!(config, CrossoverError::Config(_)));

        let producer = CrossoverError::from(ProducerError::Failed {
            key: "graph".to_string(),
            reason: "boom".to_string(),
        });
        assert!(matches!(producer, CrossoverError::Producer(_)));
    }
}

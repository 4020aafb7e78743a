//! Persistence layer error types

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ScyllaDB error: {0}")]
    Scylla(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl PersistenceError {
    pub fn not_found(entity_type: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        }
    }

    /// Domain absence, as opposed to a backend failure
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        Self::Scylla(err.to_string())
    }
}

#[cfg(feature = "scylla")]
impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        Self::Scylla(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for PersistenceError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            Self::CacheUnavailable(err.to_string())
        } else {
            Self::Redis(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[cfg(all(test, feature = "redis"))]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unreachable_redis_is_cache_unavailable() {
        let refused = redis::RedisError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(
            PersistenceError::from(refused),
            PersistenceError::CacheUnavailable(_)
        ));

        let reset = redis::RedisError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(
            PersistenceError::from(reset),
            PersistenceError::CacheUnavailable(_)
        ));
    }

    #[test]
    fn test_reply_errors_stay_redis() {
        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "unexpected reply"));
        assert!(matches!(PersistenceError::from(err), PersistenceError::Redis(_)));
    }
}

//! # Service Error Types
//!
//! Unified error handling for the service boundary. Storage and broker
//! failures collapse into [`ServiceError::Upstream`]; absence and duplicate
//! references stay distinct so an API layer can map them to client statuses.

use price_broker::BrokerError;
use price_domain::DomainError;
use price_persistence::PersistenceError;
use thiserror::Error;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Entity not found: {entity_type} with id '{id}'")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    /// HTTP status code for this error
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::InvalidInput(_) => 400,
            Self::Upstream(_) => 502,
            Self::Configuration(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Upstream(_) => "UPSTREAM_FAILURE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity_type, key } => Self::NotFound {
                entity_type,
                id: key,
            },
            PersistenceError::Conflict(message) => Self::Conflict(message),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<BrokerError> for ServiceError {
    fn from(err: BrokerError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            DomainError::InvalidReference(_) => Self::InvalidInput(err.to_string()),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_mapping() {
        let err = ServiceError::from(PersistenceError::not_found("product", 7));
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);

        let err = ServiceError::from(PersistenceError::Conflict("u1".into()));
        assert_eq!(err.error_code(), "CONFLICT");

        let err = ServiceError::from(PersistenceError::Scylla("timeout".into()));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_broker_errors_are_upstream() {
        for err in [
            BrokerError::Timeout { timeout_ms: 1 },
            BrokerError::transport("connection reset"),
            BrokerError::Extraction("no price".into()),
        ] {
            assert_eq!(ServiceError::from(err).error_code(), "UPSTREAM_FAILURE");
        }
    }

    #[test]
    fn test_invalid_reference_is_client_error() {
        let err = ServiceError::from(DomainError::InvalidReference(String::new()));
        assert_eq!(err.status_code(), 400);
    }
}

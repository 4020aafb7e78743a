//! Broker and dispatch error types

use thiserror::Error;

/// Errors raised by the dispatch protocol and its transports
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("No reply within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Broker transport error: {0}")]
    Transport(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),
}

impl BrokerError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "amqp")]
impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failures of an [`Extractor`](crate::Extractor) call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Reference carries no product id: {0}")]
    UnsupportedReference(String),

    #[error("Upstream request failed: {0}")]
    Request(String),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Upstream response is missing {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, BrokerError>;

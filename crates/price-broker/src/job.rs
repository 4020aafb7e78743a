//! Job kinds and the tagged reply format exchanged with workers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BrokerError, Result};

/// Durable job queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Full product attributes, replies with `ProductDetails`
    ProductData,
    /// Current price only, replies with `PriceQuote`
    ProductPrice,
}

impl JobKind {
    pub const ALL: [Self; 2] = [Self::ProductData, Self::ProductPrice];

    /// Queue name, also the routing key on the default exchange
    #[must_use]
    pub const fn queue(self) -> &'static str {
        match self {
            Self::ProductData => "get_product_data",
            Self::ProductPrice => "get_product_price",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue())
    }
}

impl FromStr for JobKind {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.queue() == s)
            .ok_or_else(|| BrokerError::InvalidPayload(format!("unknown queue '{s}'")))
    }
}

/// Reply body published by a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobReply<T> {
    Success { data: T },
    Failure { reason: String },
}

impl<T> JobReply<T> {
    pub fn failure(reason: impl ToString) -> Self {
        Self::Failure {
            reason: reason.to_string(),
        }
    }

    /// Convert a failure marker into [`BrokerError::Extraction`].
    ///
    /// # Errors
    ///
    /// Returns the worker's failure reason.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { reason } => Err(BrokerError::Extraction(reason)),
        }
    }
}

impl<T> From<std::result::Result<T, String>> for JobReply<T> {
    fn from(result: std::result::Result<T, String>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(reason) => Self::Failure { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use price_domain::PriceQuote;

    #[test]
    fn test_queue_names() {
        assert_eq!(JobKind::ProductData.queue(), "get_product_data");
        assert_eq!(
            "get_product_price".parse::<JobKind>().unwrap(),
            JobKind::ProductPrice
        );
        assert!("get_product_reviews".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        let ok = JobReply::Success {
            data: PriceQuote { price: 450.0 },
        };
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"status":"success","data":{"price":450.0}}"#
        );

        let failed: JobReply<PriceQuote> =
            serde_json::from_str(r#"{"status":"failure","reason":"no price"}"#).unwrap();
        assert!(matches!(
            failed.into_result(),
            Err(BrokerError::Extraction(reason)) if reason == "no price"
        ));
    }
}

//! Extractor contract consumed by the worker.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ExtractionError;
use price_domain::{PriceQuote, ProductDetails};

/// Retrieves product attributes from a third-party source
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name, rating, description and current price of `reference`
    async fn fetch_details(&self, reference: &str) -> Result<ProductDetails, ExtractionError>;

    /// Current price of `reference`
    async fn fetch_price(&self, reference: &str) -> Result<PriceQuote, ExtractionError>;
}

/// Shared extractor handle
pub type SharedExtractor = Arc<dyn Extractor>;

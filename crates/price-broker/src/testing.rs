//! Test doubles shared by the broker tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ExtractionError;
use crate::extractor::Extractor;
use price_domain::{PriceQuote, ProductDetails};

/// Extractor answering from a fixed price table
#[derive(Debug, Clone, Default)]
pub struct StubExtractor {
    prices: HashMap<String, f64>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, reference: &str, price: f64) -> Self {
        self.prices.insert(reference.to_string(), price);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn price(&self, reference: &str) -> Result<f64, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.prices
            .get(reference)
            .copied()
            .ok_or(ExtractionError::MissingField("price"))
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn fetch_details(&self, reference: &str) -> Result<ProductDetails, ExtractionError> {
        let price = self.price(reference).await?;
        Ok(ProductDetails {
            url: reference.to_string(),
            name: format!("Product {reference}"),
            rating: Some(4.5),
            description: None,
            price,
        })
    }

    async fn fetch_price(&self, reference: &str) -> Result<PriceQuote, ExtractionError> {
        Ok(PriceQuote {
            price: self.price(reference).await?,
        })
    }
}

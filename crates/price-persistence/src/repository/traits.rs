//! # Repository Traits
//!
//! Abstract repository interface for products and their price history.
//! Implementations can be swapped for different backends (ScyllaDB, memory, etc.)

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use price_domain::{NewProduct, PriceHistoryEntry, Product};

// =============================================================================
// PRODUCT REPOSITORY
// =============================================================================

/// Repository for Product and PriceHistory operations
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Get every product
    async fn list_all(&self) -> Result<Vec<Product>>;

    /// Get products owned by `owner_id`
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Product>>;

    /// Get product by ID, `NotFound` when absent
    async fn get_by_id(&self, product_id: i64) -> Result<Product>;

    /// Look a product up by its reference
    async fn find_by_url(&self, url: &str) -> Result<Option<Product>>;

    /// Insert a product. Fails with `Conflict` when the reference is taken.
    async fn create(&self, product: NewProduct) -> Result<Product>;

    /// Delete a product and its price history, returning the deleted row
    async fn delete(&self, product_id: i64) -> Result<Product>;

    /// Record a price and return the product's full history
    async fn append_history(&self, product_id: i64, price: f64) -> Result<Vec<PriceHistoryEntry>>;

    /// Get a product's price history, oldest first
    async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>>;
}

/// Shared repository handle
pub type SharedProductRepository = Arc<dyn ProductRepository>;

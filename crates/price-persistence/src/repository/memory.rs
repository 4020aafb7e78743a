//! In-memory product repository.
//!
//! Mirrors the relational contract (serial ids, unique reference, cascading
//! history delete) for tests and single-process runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::traits::ProductRepository;
use crate::error::{PersistenceError, Result};
use price_domain::{NewProduct, PriceHistoryEntry, Product};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<i64, Product>,
    history: Vec<PriceHistoryEntry>,
    last_product_id: i64,
    last_history_id: i64,
}

/// `BTreeMap`-backed [`ProductRepository`]
#[derive(Debug, Default)]
pub struct MemoryProductRepository {
    state: Mutex<State>,
    queries: AtomicUsize,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read queries served so far
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn read(&self) -> MutexGuard<'_, State> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.write()
    }

    fn write(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn history_of(state: &State, product_id: i64) -> Vec<PriceHistoryEntry> {
    state
        .history
        .iter()
        .filter(|entry| entry.product_id == product_id)
        .cloned()
        .collect()
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn list_all(&self) -> Result<Vec<Product>> {
        Ok(self.read().products.values().cloned().collect())
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Product>> {
        Ok(self
            .read()
            .products
            .values()
            .filter(|product| product.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, product_id: i64) -> Result<Product> {
        self.read()
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("product", product_id))
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Product>> {
        Ok(self
            .read()
            .products
            .values()
            .find(|product| product.url == url)
            .cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.write();
        if state.products.values().any(|p| p.url == product.url) {
            return Err(PersistenceError::Conflict(format!(
                "product with url {} already exists",
                product.url
            )));
        }

        state.last_product_id += 1;
        let product = product.with_id(state.last_product_id);
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete(&self, product_id: i64) -> Result<Product> {
        let mut state = self.write();
        let product = state
            .products
            .remove(&product_id)
            .ok_or_else(|| PersistenceError::not_found("product", product_id))?;
        state.history.retain(|entry| entry.product_id != product_id);
        Ok(product)
    }

    async fn append_history(&self, product_id: i64, price: f64) -> Result<Vec<PriceHistoryEntry>> {
        let mut state = self.write();
        if !state.products.contains_key(&product_id) {
            return Err(PersistenceError::not_found("product", product_id));
        }

        state.last_history_id += 1;
        let entry = PriceHistoryEntry {
            id: state.last_history_id,
            product_id,
            price,
            recorded_at: Utc::now(),
        };
        state.history.push(entry);
        Ok(history_of(&state, product_id))
    }

    async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        Ok(history_of(&self.read(), product_id))
    }
}

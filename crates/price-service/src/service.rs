//! # Product Service
//!
//! The operations exposed to the API layer. Reads go through the cache-aside
//! layer; every mutation names the keys whose query results it changes and
//! has them deleted before it returns.
//!
//! | Operation               | Reads                      | Invalidates                                   |
//! |-------------------------|----------------------------|-----------------------------------------------|
//! | `get_products`          | `products:list` / `products:{owner}` | -                                   |
//! | `get_product`           | `product:{id}`             | -                                             |
//! | `create_product`        | -                          | `products:list`, `products:{owner}`           |
//! | `delete_product`        | -                          | list keys, `product:{id}`, `price_history:{id}` |
//! | `refresh_price_history` | `product:{id}`             | `price_history:{id}`                          |
//! | `get_price_history`     | `product:{id}`, `price_history:{id}` | -                                   |

use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use price_broker::ProductScraper;
use price_domain::{Actor, NewProduct, PriceHistoryEntry, Product, ProductDetails, normalize_reference};
use price_persistence::{CacheAside, CacheKey, PersistenceError, SharedProductRepository};

/// Product catalogue and price history on behalf of an [`Actor`]
pub struct ProductService {
    repo: SharedProductRepository,
    cache: CacheAside,
    scraper: Arc<dyn ProductScraper>,
}

impl ProductService {
    pub fn new(
        repo: SharedProductRepository,
        cache: CacheAside,
        scraper: Arc<dyn ProductScraper>,
    ) -> Self {
        Self {
            repo,
            cache,
            scraper,
        }
    }

    pub const fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Every product for privileged actors, the actor's own otherwise
    pub async fn get_products(&self, actor: Actor) -> ServiceResult<Vec<Product>> {
        let products = self
            .cache
            .read_through(CacheKey::listing_for(&actor), move || async move {
                if actor.is_privileged() {
                    self.repo.list_all().await
                } else {
                    self.repo.list_by_owner(actor.id).await
                }
            })
            .await?;

        Ok(products)
    }

    /// One product. The cached entry is shared by all actors, so ownership
    /// is checked on whatever comes back, cached or not.
    pub async fn get_product(&self, product_id: i64, actor: Actor) -> ServiceResult<Product> {
        let product: Product = self
            .cache
            .read_through(CacheKey::Product(product_id), move || {
                self.repo.get_by_id(product_id)
            })
            .await?;

        if !actor.can_access(product.owner_id) {
            tracing::debug!(product_id, actor_id = actor.id, "Product hidden from non-owner");
            return Err(ServiceError::not_found("product", product_id));
        }

        Ok(product)
    }

    /// Scrape `reference` and start tracking it for `actor`.
    ///
    /// A reference that is already tracked is a conflict, detected before
    /// any job is dispatched and without touching the cache.
    pub async fn create_product(&self, reference: &str, actor: Actor) -> ServiceResult<Product> {
        let url = normalize_reference(reference)?;

        if self.repo.find_by_url(&url).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "product with url {url} already exists"
            )));
        }

        let details = self.scraper.fetch_details(&url).await?;
        let price = details.price;
        let new_product = NewProduct::from_details(ProductDetails { url, ..details }, actor.id);

        let product = self
            .cache
            .write(
                &[CacheKey::ProductList, CacheKey::OwnerProducts(actor.id)],
                move || self.repo.create(new_product),
            )
            .await?;

        if let Err(e) = self.repo.append_history(product.id, price).await {
            self.abandon(&product).await;
            return Err(e.into());
        }
        self.cache.prime(CacheKey::Product(product.id), &product).await;

        tracing::info!(product_id = product.id, owner_id = actor.id, url = %product.url, "Product created");
        Ok(product)
    }

    /// Remove a product whose first price was never recorded, leaving its
    /// reference free for the next create.
    async fn abandon(&self, product: &Product) {
        let keys = [CacheKey::ProductList, CacheKey::OwnerProducts(product.owner_id)];
        let product_id = product.id;
        match self.cache.write(&keys, move || self.repo.delete(product_id)).await {
            Ok(_) => tracing::warn!(product_id, url = %product.url, "Product without first price removed"),
            Err(e) => {
                tracing::error!(product_id, url = %product.url, error = %e, "Product without first price left behind");
            }
        }
    }

    /// Delete a product and its history. Privileged actors may delete any
    /// product, others only their own.
    pub async fn delete_product(&self, product_id: i64, actor: Actor) -> ServiceResult<Product> {
        let product = self.repo.get_by_id(product_id).await?;
        if !actor.can_access(product.owner_id) {
            return Err(ServiceError::not_found("product", product_id));
        }

        let keys = [
            CacheKey::ProductList,
            CacheKey::OwnerProducts(product.owner_id),
            CacheKey::Product(product_id),
            CacheKey::PriceHistory(product_id),
        ];
        let deleted = self
            .cache
            .write(&keys, move || self.repo.delete(product_id))
            .await?;

        tracing::info!(product_id, owner_id = deleted.owner_id, "Product deleted");
        Ok(deleted)
    }

    /// Fetch the current price and append it to the product's history
    pub async fn refresh_price_history(
        &self,
        product_id: i64,
        actor: Actor,
    ) -> ServiceResult<Vec<PriceHistoryEntry>> {
        let product = self.get_product(product_id, actor).await?;
        let quote = self.scraper.fetch_price(&product.url).await?;

        let history = self
            .cache
            .write(&[CacheKey::PriceHistory(product_id)], move || {
                self.repo.append_history(product_id, quote.price)
            })
            .await?;

        tracing::info!(product_id, price = quote.price, entries = history.len(), "Price recorded");
        Ok(history)
    }

    /// Recorded prices of a product the actor can see. No recorded price is
    /// reported as not found.
    pub async fn get_price_history(
        &self,
        product_id: i64,
        actor: Actor,
    ) -> ServiceResult<Vec<PriceHistoryEntry>> {
        self.get_product(product_id, actor).await?;

        let history = self
            .cache
            .read_through(CacheKey::PriceHistory(product_id), move || async move {
                let history = self.repo.price_history(product_id).await?;
                if history.is_empty() {
                    return Err(PersistenceError::not_found("price_history", product_id));
                }
                Ok(history)
            })
            .await?;

        Ok(history)
    }
}

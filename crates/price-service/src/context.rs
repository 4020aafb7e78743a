//! # Service Context
//!
//! Wiring of the product service onto its collaborators.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::service::ProductService;
use price_broker::{AmqpBroker, Broker, Dispatcher, JobKind, ProductScraper};
use price_persistence::{
    CacheAside, CacheClient, DEFAULT_TTL, ReadStrategy, ScyllaClient, ScyllaProductRepository,
    SharedCacheStore, SharedProductRepository, WriteStrategy,
};

/// Application context shared by request handlers
#[derive(Clone)]
pub struct ServiceContext {
    /// Product operations
    pub products: Arc<ProductService>,
}

impl ServiceContext {
    /// Connect to ScyllaDB, Redis and the broker described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Upstream`] when any backend is unreachable.
    pub async fn connect(config: &Config) -> ServiceResult<Self> {
        tracing::info!(
            hosts = ?config.scylla.hosts,
            keyspace = %config.scylla.keyspace,
            "Connecting to ScyllaDB"
        );
        let scylla = ScyllaClient::new(config.scylla.clone()).await?;
        scylla.migrate().await?;

        tracing::info!(url = %config.cache.url, "Connecting to Redis");
        let cache = CacheClient::new(config.cache.clone()).await?;

        tracing::info!("Connecting to broker");
        let broker = AmqpBroker::connect(&config.amqp).await?;
        for kind in JobKind::ALL {
            broker.declare_queue(kind.queue()).await?;
        }
        let dispatcher = Dispatcher::connect(Arc::new(broker))
            .await?
            .with_timeout(config.dispatch_timeout);

        ServiceContextBuilder::new()
            .with_repository(Arc::new(ScyllaProductRepository::new(Arc::new(scylla))))
            .with_cache(Arc::new(cache))
            .with_cache_ttl(config.cache.ttl)
            .with_scraper(Arc::new(dispatcher))
            .build()
            .map_err(|e| ServiceError::Configuration(e.to_string()))
    }
}

/// Builder for [`ServiceContext`]
pub struct ServiceContextBuilder {
    repository: Option<SharedProductRepository>,
    cache: Option<SharedCacheStore>,
    scraper: Option<Arc<dyn ProductScraper>>,
    cache_ttl: Duration,
    read_strategy: ReadStrategy,
    write_strategy: WriteStrategy,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            repository: None,
            cache: None,
            scraper: None,
            cache_ttl: DEFAULT_TTL,
            read_strategy: ReadStrategy::default(),
            write_strategy: WriteStrategy::default(),
        }
    }

    pub fn with_repository(mut self, repository: SharedProductRepository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_cache(mut self, cache: SharedCacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_scraper(mut self, scraper: Arc<dyn ProductScraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub const fn with_strategies(mut self, read: ReadStrategy, write: WriteStrategy) -> Self {
        self.read_strategy = read;
        self.write_strategy = write;
        self
    }

    pub fn build(self) -> Result<ServiceContext, &'static str> {
        let repository = self.repository.ok_or("product repository required")?;
        let store = self.cache.ok_or("cache store required")?;
        let scraper = self.scraper.ok_or("product scraper required")?;

        let cache = CacheAside::with_strategies(
            store,
            self.cache_ttl,
            self.read_strategy,
            self.write_strategy,
        );

        Ok(ServiceContext {
            products: Arc::new(ProductService::new(repository, cache, scraper)),
        })
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

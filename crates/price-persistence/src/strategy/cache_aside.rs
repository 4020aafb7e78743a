//! Cache-aside coordination: read-through on miss, invalidate on write.
//!
//! A populate racing an invalidation of the same key is guarded in-process
//! by a per-key generation counter. Invalidation bumps the generation before
//! deleting; a read-through only stores its value when the generation it saw
//! before loading is still current, and deletes its own write again if the
//! generation moved while storing. A key is only tracked while at least one
//! read-through on it is in flight. Readers in *other* processes can still
//! repopulate a just-invalidated key with a value loaded before the commit;
//! that entry lives at most one TTL.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ReadStrategy, WriteStrategy};
use crate::cache::{CacheKey, DEFAULT_TTL, SharedCacheStore};
use crate::error::Result;

/// Cache-aside layer over a shared [`CacheStore`](crate::cache::CacheStore)
pub struct CacheAside {
    store: SharedCacheStore,
    ttl: Duration,
    read_strategy: ReadStrategy,
    write_strategy: WriteStrategy,
    in_flight: Mutex<HashMap<String, KeyReads>>,
}

/// Invalidation count and active readers of one key
#[derive(Debug, Default)]
struct KeyReads {
    generation: u64,
    readers: usize,
}

impl CacheAside {
    /// Create a layer with the default TTL and strategies.
    pub fn new(store: SharedCacheStore) -> Self {
        Self::with_strategies(
            store,
            DEFAULT_TTL,
            ReadStrategy::default(),
            WriteStrategy::default(),
        )
    }

    /// Create with custom TTL and strategies.
    pub fn with_strategies(
        store: SharedCacheStore,
        ttl: Duration,
        read_strategy: ReadStrategy,
        write_strategy: WriteStrategy,
    ) -> Self {
        Self {
            store,
            ttl,
            read_strategy,
            write_strategy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &SharedCacheStore {
        &self.store
    }

    /// Return the cached value for `key`, or run `loader`, cache its result
    /// and return it. Loader errors are returned as-is and never cached.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: CacheKey,
        loader: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = key.to_string();
        let reader = self.begin_read(&key);
        let generation = reader.seen;

        self.read_strategy
            .read(
                || self.lookup::<T>(&key),
                loader,
                |value| self.populate(&key, value, generation),
            )
            .await
    }

    /// Delete every listed key. Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store error when the delete could not be issued.
    pub async fn invalidate(&self, keys: &[CacheKey]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        {
            let mut in_flight = self.lock_in_flight();
            for key in &keys {
                if let Some(reads) = in_flight.get_mut(key) {
                    reads.generation += 1;
                }
            }
        }

        let deleted = self.store.delete_many(&keys).await?;
        tracing::debug!(keys = ?keys, deleted, "Cache keys invalidated");
        Ok(deleted)
    }

    /// Run a mutation, then invalidate `keys` before returning its result.
    ///
    /// Nothing is invalidated when the mutation fails.
    pub async fn write<T, E, F, Fut>(
        &self,
        keys: &[CacheKey],
        mutation: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.write_strategy
            .write(mutation, || async move {
                self.invalidate(keys).await.map(|_| ())
            })
            .await
    }

    /// Store a value known to be current, e.g. an entity just created.
    /// Failures are logged only.
    pub async fn prime<T: Serialize>(&self, key: CacheKey, value: &T) {
        if self.read_strategy == ReadStrategy::DbOnly {
            return;
        }

        let key = key.to_string();
        let result = match serde_json::to_string(value) {
            Ok(json) => self.store.set_ex(&key, &json, self.ttl).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(key = %key, error = %e, "Failed to prime cache");
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(json) = self.store.get(key).await? else {
            tracing::debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: T, seen: u64) -> Result<()> {
        if self.generation(key) != seen {
            tracing::debug!(key = %key, "Key invalidated during load, not caching");
            return Ok(());
        }

        let json = serde_json::to_string(&value)?;
        self.store.set_ex(key, &json, self.ttl).await?;

        if self.generation(key) != seen {
            self.store.delete_many(&[key.to_string()]).await?;
            tracing::debug!(key = %key, "Key invalidated while caching, entry dropped");
        }
        Ok(())
    }

    fn begin_read(&self, key: &str) -> ReadGuard<'_> {
        let mut in_flight = self.lock_in_flight();
        let reads = in_flight.entry(key.to_string()).or_default();
        reads.readers += 1;

        ReadGuard {
            layer: self,
            key: key.to_string(),
            seen: reads.generation,
        }
    }

    fn end_read(&self, key: &str) {
        let mut in_flight = self.lock_in_flight();
        if let Some(reads) = in_flight.get_mut(key) {
            reads.readers = reads.readers.saturating_sub(1);
            if reads.readers == 0 {
                in_flight.remove(key);
            }
        }
    }

    fn generation(&self, key: &str) -> u64 {
        self.lock_in_flight()
            .get(key)
            .map_or(0, |reads| reads.generation)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, KeyReads>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.lock_in_flight().len()
    }
}

/// Registration of one in-flight read-through; released on drop, including
/// when the read is cancelled.
struct ReadGuard<'a> {
    layer: &'a CacheAside,
    key: String,
    seen: u64,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.layer.end_read(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCache};
    use crate::error::PersistenceError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Store whose every operation fails
    struct DownCache;

    #[async_trait]
    impl CacheStore for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(PersistenceError::CacheUnavailable("connection refused".into()))
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(PersistenceError::CacheUnavailable("connection refused".into()))
        }

        async fn delete_many(&self, _keys: &[String]) -> Result<u64> {
            Err(PersistenceError::CacheUnavailable("connection refused".into()))
        }
    }

    fn layer() -> (Arc<MemoryCache>, CacheAside) {
        let store = Arc::new(MemoryCache::new());
        let layer = CacheAside::new(store.clone());
        (store, layer)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (store, layer) = layer();
        let loads = AtomicUsize::new(0);
        let loads = &loads;

        for _ in 0..3 {
            let value: Vec<i64> = layer
                .read_through(CacheKey::ProductList, move || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PersistenceError>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(store.contains("products:list"));
    }

    #[tokio::test]
    async fn test_loader_error_not_cached() {
        let (store, layer) = layer();

        let result: std::result::Result<String, PersistenceError> = layer
            .read_through(CacheKey::Product(9), || async {
                Err(PersistenceError::not_found("product", 9))
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        assert!(!store.contains("product:9"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let (_, layer) = layer();
        let loads = AtomicUsize::new(0);
        let loads = &loads;
        let load = move || async move {
            Ok::<_, PersistenceError>(loads.fetch_add(1, Ordering::SeqCst))
        };

        let first: usize = layer.read_through(CacheKey::PriceHistory(1), load).await.unwrap();
        layer.invalidate(&[CacheKey::PriceHistory(1)]).await.unwrap();
        let second: usize = layer.read_through(CacheKey::PriceHistory(1), load).await.unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (_, layer) = layer();
        let keys = [CacheKey::Product(1), CacheKey::OwnerProducts(2)];

        assert_eq!(layer.invalidate(&keys).await.unwrap(), 0);
        assert_eq!(layer.invalidate(&keys).await.unwrap(), 0);
        assert_eq!(layer.invalidate(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_cache_falls_through() {
        let layer = CacheAside::new(Arc::new(DownCache));

        let value: i32 = layer
            .read_through(CacheKey::Product(1), || async { Ok::<_, PersistenceError>(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);

        let written: i32 = layer
            .write(&[CacheKey::ProductList], || async { Ok::<_, PersistenceError>(6) })
            .await
            .unwrap();
        assert_eq!(written, 6);

        layer.prime(CacheKey::Product(1), &5).await;
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache() {
        let (store, layer) = layer();
        layer.prime(CacheKey::ProductList, &vec![1]).await;

        let result: std::result::Result<(), PersistenceError> = layer
            .write(&[CacheKey::ProductList], || async {
                Err(PersistenceError::Conflict("u1".into()))
            })
            .await;

        assert!(matches!(result, Err(PersistenceError::Conflict(_))));
        assert!(store.contains("products:list"));
    }

    #[tokio::test]
    async fn test_stale_load_not_cached_after_invalidation() {
        let (store, layer) = layer();
        let layer = Arc::new(layer);
        let loading = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let reader = {
            let layer = layer.clone();
            let loading = loading.clone();
            let release = release.clone();
            tokio::spawn(async move {
                layer
                    .read_through(CacheKey::ProductList, || async move {
                        loading.notify_one();
                        release.notified().await;
                        Ok::<_, PersistenceError>(vec!["stale".to_string()])
                    })
                    .await
            })
        };

        loading.notified().await;
        layer.invalidate(&[CacheKey::ProductList]).await.unwrap();
        release.notify_one();

        let stale = reader.await.unwrap().unwrap();
        assert_eq!(stale, vec!["stale".to_string()]);
        assert!(!store.contains("products:list"));
        assert_eq!(layer.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_invalidations_without_readers_leave_no_state() {
        let (_, layer) = layer();

        for id in 0..10_000 {
            layer
                .invalidate(&[CacheKey::Product(id), CacheKey::PriceHistory(id)])
                .await
                .unwrap();
        }
        assert_eq!(layer.tracked_keys(), 0);

        let _: i64 = layer
            .read_through(CacheKey::Product(7), || async { Ok::<_, PersistenceError>(7) })
            .await
            .unwrap();
        let _: std::result::Result<i64, PersistenceError> = layer
            .read_through(CacheKey::Product(8), || async {
                Err(PersistenceError::not_found("product", 8))
            })
            .await;
        assert_eq!(layer.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_read_releases_key() {
        let (_, layer) = layer();
        let layer = Arc::new(layer);
        let loading = Arc::new(Notify::new());

        let reader = {
            let layer = layer.clone();
            let loading = loading.clone();
            tokio::spawn(async move {
                layer
                    .read_through(CacheKey::Product(1), || async move {
                        loading.notify_one();
                        std::future::pending::<std::result::Result<i64, PersistenceError>>().await
                    })
                    .await
            })
        };

        loading.notified().await;
        assert_eq!(layer.tracked_keys(), 1);

        reader.abort();
        assert!(reader.await.unwrap_err().is_cancelled());
        assert_eq!(layer.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_db_only_bypasses_cache() {
        let store = Arc::new(MemoryCache::new());
        let layer = CacheAside::with_strategies(
            store.clone(),
            DEFAULT_TTL,
            ReadStrategy::DbOnly,
            WriteStrategy::DbOnly,
        );

        let _: i32 = layer
            .read_through(CacheKey::Product(3), || async { Ok::<_, PersistenceError>(3) })
            .await
            .unwrap();
        layer.prime(CacheKey::Product(4), &4).await;

        assert!(store.is_empty());
    }
}

//! # Cache Module
//!
//! Key/value store with per-key TTL sitting in front of the product store.
//! Values are UTF-8 JSON documents; datetimes serialize as ISO-8601.

pub mod keys;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_client;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

pub use keys::CacheKey;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_client::{CacheClient, CacheConfig};

/// TTL applied to every entry written by this system
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// `GET` / `SETEX` / `DEL` contract of the cache store
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a raw value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a raw value with a TTL
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete keys; absent keys are ignored. Returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64>;
}

/// Shared cache store handle
pub type SharedCacheStore = Arc<dyn CacheStore>;

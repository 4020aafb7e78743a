//! # Redis Cache Layer
//!
//! Redis-backed [`CacheStore`] over a multiplexed connection manager.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use super::{CacheStore, DEFAULT_TTL};
use crate::error::Result;

/// Redis cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Redis cache client
#[derive(Clone)]
pub struct CacheClient {
    conn: ConnectionManager,
    config: CacheConfig,
}

impl CacheClient {
    /// Create a new cache client
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        tracing::debug!(url = %config.url, "Redis connection manager ready");
        Ok(Self { conn, config })
    }

    /// Configured entry TTL
    pub const fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Get raw connection for advanced operations
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CacheStore for CacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await?;
        Ok(deleted)
    }
}

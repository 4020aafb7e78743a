//! In-process cache store.
//!
//! Same contract as the Redis store, used for tests and single-process runs.
//! Expired entries are evicted lazily on read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::CacheStore;
use crate::error::Result;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// `HashMap`-backed [`CacheStore`] with per-key expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a live entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        let mut entries = self.lock();
        let removed = keys.iter().filter(|key| entries.remove(*key).is_some()).count();
        Ok(removed as u64)
    }
}

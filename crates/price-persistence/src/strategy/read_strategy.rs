//! Read strategy implementations using enum dispatch.

use std::future::Future;

use crate::error::PersistenceError;

/// Read strategy enum - determines cache/db access pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Check cache first, fall back to DB on miss and populate the cache
    #[default]
    CacheFirst,
    /// Only read from database, skip cache
    DbOnly,
}

impl ReadStrategy {
    /// Execute a read operation according to the strategy.
    ///
    /// - `cache_fn`: Async function to read from cache
    /// - `db_fn`: Async function to read from the authoritative store
    /// - `populate_fn`: Async function to store the loaded value in cache
    ///
    /// Cache failures never fail the read: a failed lookup falls through to
    /// the store and a failed populate is only logged.
    pub async fn read<T, E, CacheFut, DbFut, PopulateFut>(
        &self,
        cache_fn: impl FnOnce() -> CacheFut,
        db_fn: impl FnOnce() -> DbFut,
        populate_fn: impl FnOnce(T) -> PopulateFut,
    ) -> Result<T, E>
    where
        T: Clone,
        CacheFut: Future<Output = Result<Option<T>, PersistenceError>>,
        DbFut: Future<Output = Result<T, E>>,
        PopulateFut: Future<Output = Result<(), PersistenceError>>,
    {
        match self {
            Self::CacheFirst => {
                match cache_fn().await {
                    Ok(Some(value)) => return Ok(value),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Cache error, falling back to DB");
                    }
                }

                let value = db_fn().await?;

                if let Err(e) = populate_fn(value.clone()).await {
                    tracing::warn!(error = %e, "Failed to populate cache");
                }

                Ok(value)
            }

            Self::DbOnly => db_fn().await,
        }
    }
}

//! Write strategy implementations using enum dispatch.

use std::future::Future;

use crate::error::PersistenceError;

/// Write strategy enum - determines cache/db write pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Write to DB, then invalidate affected cache keys before returning
    #[default]
    WriteAround,
    /// Write to DB only, no cache interaction
    DbOnly,
}

impl WriteStrategy {
    /// Execute a write operation according to the strategy.
    ///
    /// - `db_fn`: Async function performing the mutation
    /// - `invalidate_fn`: Async function deleting stale cache keys
    ///
    /// Invalidation only runs after a successful mutation. A failed
    /// invalidation is logged and does not fail the write.
    pub async fn write<T, E, DbFut, InvalidateFut>(
        &self,
        db_fn: impl FnOnce() -> DbFut,
        invalidate_fn: impl FnOnce() -> InvalidateFut,
    ) -> Result<T, E>
    where
        DbFut: Future<Output = Result<T, E>>,
        InvalidateFut: Future<Output = Result<(), PersistenceError>>,
    {
        match self {
            Self::WriteAround => {
                let value = db_fn().await?;

                if let Err(e) = invalidate_fn().await {
                    tracing::warn!(error = %e, "Failed to invalidate cache");
                }

                Ok(value)
            }

            Self::DbOnly => db_fn().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_write_around() {
        let strategy = WriteStrategy::WriteAround;
        let invalidated = Arc::new(AtomicBool::new(false));
        let db_called = Arc::new(AtomicBool::new(false));

        let invalidate_flag = invalidated.clone();
        let db_flag = db_called.clone();

        let result: Result<i32, PersistenceError> = strategy
            .write(
                || {
                    db_flag.store(true, Ordering::SeqCst);
                    async { Ok(42) }
                },
                || {
                    invalidate_flag.store(true, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert!(db_called.load(Ordering::SeqCst));
        assert!(invalidated.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_write_skips_invalidation() {
        let strategy = WriteStrategy::WriteAround;
        let invalidated = Arc::new(AtomicBool::new(false));
        let invalidate_flag = invalidated.clone();

        let result: Result<i32, PersistenceError> = strategy
            .write(
                || async { Err(PersistenceError::Conflict("u1".into())) },
                || {
                    invalidate_flag.store(true, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await;

        assert!(matches!(result, Err(PersistenceError::Conflict(_))));
        assert!(!invalidated.load(Ordering::SeqCst)); // Cache NOT touched
    }

    #[tokio::test]
    async fn test_invalidation_failure_keeps_write() {
        let strategy = WriteStrategy::WriteAround;

        let result: Result<i32, PersistenceError> = strategy
            .write(
                || async { Ok(1) },
                || async { Err(PersistenceError::CacheUnavailable("down".into())) },
            )
            .await;

        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_db_only() {
        let strategy = WriteStrategy::DbOnly;
        let invalidated = Arc::new(AtomicBool::new(false));
        let invalidate_flag = invalidated.clone();

        let result: Result<i32, PersistenceError> = strategy
            .write(
                || async { Ok(5) },
                || {
                    invalidate_flag.store(true, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 5);
        assert!(!invalidated.load(Ordering::SeqCst)); // Cache NOT called
    }
}

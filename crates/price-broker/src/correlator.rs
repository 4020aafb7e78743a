//! # Reply Correlation
//!
//! Many concurrent calls share one reply subscription, so replies are
//! demultiplexed by correlation id alone. Each registration owns a one-shot
//! slot in a map; the map lock is held only while inserting or removing a
//! slot, never while a caller waits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{BrokerError, Result};

#[derive(Default)]
struct Registry {
    waiters: HashMap<String, oneshot::Sender<Vec<u8>>>,
    closed: bool,
}

#[derive(Default)]
struct Inner {
    registry: Mutex<Registry>,
    dropped: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, correlation_id: &str) -> bool {
        self.lock().waiters.remove(correlation_id).is_some()
    }
}

/// Correlation table shared by a dispatcher and its reply loop
#[derive(Clone, Default)]
pub struct ReplyCorrelator {
    inner: Arc<Inner>,
}

impl ReplyCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a correlation id and the slot its reply will land in.
    ///
    /// # Errors
    ///
    /// Fails with [`BrokerError::Transport`] once the correlator is closed.
    pub fn register(&self) -> Result<ReplyHandle> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        {
            let mut registry = self.inner.lock();
            if registry.closed {
                return Err(BrokerError::transport("reply subscription lost"));
            }
            registry.waiters.insert(correlation_id.clone(), tx);
        }

        Ok(ReplyHandle {
            correlation_id,
            rx,
            inner: self.inner.clone(),
        })
    }

    /// Hand `body` to the waiter registered under `correlation_id`.
    ///
    /// Returns `false` and drops the reply when no waiter is registered
    /// (late, duplicate or foreign reply).
    pub fn deliver(&self, correlation_id: &str, body: Vec<u8>) -> bool {
        let waiter = self.inner.lock().waiters.remove(correlation_id);

        let delivered = waiter.is_some_and(|tx| tx.send(body).is_ok());
        if !delivered {
            self.inner.dropped.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(correlation_id, "Dropping reply with no waiting caller");
        }
        delivered
    }

    /// Fail every pending waiter and refuse new registrations
    pub fn close(&self) {
        let mut registry = self.inner.lock();
        registry.closed = true;
        registry.waiters.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Registrations still waiting for a reply
    pub fn pending(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Replies discarded because nobody was waiting
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }
}

/// One outstanding registration. Dropping it releases the correlation id.
pub struct ReplyHandle {
    correlation_id: String,
    rx: oneshot::Receiver<Vec<u8>>,
    inner: Arc<Inner>,
}

impl ReplyHandle {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait for the reply body until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Timeout`] when the deadline passes first,
    /// [`BrokerError::Transport`] when the correlator is closed meanwhile.
    pub async fn wait(mut self, timeout: Duration) -> Result<Vec<u8>> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(BrokerError::transport("reply subscription lost")),
            Err(_) => self.expire(timeout),
        }
    }

    /// Settle a wait whose deadline has passed. The slot is sealed first, so
    /// a reply sent before this point is returned and one sent after it is
    /// refused and counted as dropped by `deliver`.
    fn expire(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.rx.close();
        self.rx.try_recv().map_err(|_| BrokerError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

impl Drop for ReplyHandle {
    fn drop(&mut self) {
        if self.inner.release(&self.correlation_id) {
            tracing::debug!(correlation_id = %self.correlation_id, "Released unanswered registration");
        }
    }
}

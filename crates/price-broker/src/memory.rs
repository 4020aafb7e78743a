//! In-process loopback broker.
//!
//! Same routing rules as the AMQP transport: job queues are created on first
//! use, consumers on one queue compete for messages, and replies published
//! to an address nobody is subscribed to are discarded.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use uuid::Uuid;

use crate::error::Result;
use crate::transport::{
    Acknowledge, Broker, DIRECT_REPLY_TO, Delivery, DeliveryStream, Envelope, ReplySubscription,
};

type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<Envelope>>>;

struct Queue {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: SharedReceiver,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }
}

/// Loopback [`Broker`] with publish/ack counters
#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, Queue>>,
    replies: Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>,
    published: AtomicUsize,
    acknowledged: Arc<AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted by `publish`, replies included
    pub fn published(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    /// Deliveries acknowledged by consumers
    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Drop every reply subscription, as a lost connection would
    pub fn close_replies(&self) {
        lock(&self.replies).clear();
    }

    /// Open reply subscriptions
    pub fn reply_subscriptions(&self) -> usize {
        lock(&self.replies).len()
    }

    fn sender(&self, queue: &str) -> mpsc::UnboundedSender<Envelope> {
        lock(&self.queues)
            .entry(queue.to_string())
            .or_insert_with(Queue::new)
            .tx
            .clone()
    }

    fn receiver(&self, queue: &str) -> SharedReceiver {
        lock(&self.queues)
            .entry(queue.to_string())
            .or_insert_with(Queue::new)
            .rx
            .clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MemoryAcker {
    acknowledged: Arc<AtomicUsize>,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.sender(queue);
        Ok(())
    }

    async fn publish(&self, routing_key: &str, envelope: Envelope) -> Result<()> {
        self.published.fetch_add(1, Ordering::SeqCst);

        let reply_tx = lock(&self.replies).get(routing_key).cloned();
        if let Some(tx) = reply_tx {
            if tx.send(envelope).is_err() {
                tracing::debug!(routing_key, "Reply subscriber gone, message discarded");
            }
            return Ok(());
        }

        if routing_key.starts_with(DIRECT_REPLY_TO) {
            tracing::debug!(routing_key, "No reply subscription, message discarded");
            return Ok(());
        }

        // The queue owns its receiver, so this send cannot fail.
        let _ = self.sender(routing_key).send(envelope);
        Ok(())
    }

    async fn subscribe_replies(&self) -> Result<ReplySubscription> {
        let address = format!("{}.{}", DIRECT_REPLY_TO, Uuid::new_v4().simple());
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.replies).insert(address.clone(), tx);

        let replies = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|envelope| (envelope, rx))
        })
        .boxed();

        Ok(ReplySubscription { address, replies })
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let rx = self.receiver(queue);
        let acknowledged = self.acknowledged.clone();

        let deliveries = stream::unfold(rx, move |rx| {
            let acknowledged = acknowledged.clone();
            async move {
                let envelope = rx.lock().await.recv().await?;
                let delivery = Delivery::new(envelope, Box::new(MemoryAcker { acknowledged }));
                Some((Ok(delivery), rx))
            }
        })
        .boxed();

        Ok(deliveries)
    }
}

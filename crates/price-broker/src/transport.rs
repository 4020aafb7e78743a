//! # Broker Transport
//!
//! The one-way primitives the dispatch protocol is built on: publish by
//! routing key on the default exchange, consume a durable queue, and an
//! ephemeral reply subscription owned by the connection.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// RabbitMQ's per-channel reply pseudo-queue; loopback reply addresses
/// share the prefix
pub const DIRECT_REPLY_TO: &str = "amq.rabbitmq.reply-to";

/// Fields of a published message this system reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub body: Vec<u8>,
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
}

impl Envelope {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            reply_to: None,
            correlation_id: None,
        }
    }

    /// Ask for a reply on `reply_to`, tagged with `correlation_id`
    #[must_use]
    pub fn with_reply(mut self, reply_to: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Reply envelope: echoes only the correlation id
    pub fn reply(body: impl Into<Vec<u8>>, correlation_id: Option<String>) -> Self {
        Self {
            body: body.into(),
            reply_to: None,
            correlation_id,
        }
    }
}

/// Settles a consumed message with the broker
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A message taken off a job queue. Acknowledging consumes it, so a
/// delivery is settled at most once.
pub struct Delivery {
    pub envelope: Envelope,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(envelope: Envelope, acker: Box<dyn Acknowledge>) -> Self {
        Self { envelope, acker }
    }

    /// Remove the message from its queue.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the broker rejects the ack.
    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("envelope", &self.envelope)
            .finish_non_exhaustive()
    }
}

/// Replies addressed to this connection. The stream ends when the
/// subscription is lost.
pub struct ReplySubscription {
    pub address: String,
    pub replies: BoxStream<'static, Envelope>,
}

/// Stream of job deliveries from one queue
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// Message broker primitives
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a durable queue, no-op if it exists
    async fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Publish on the default exchange; `routing_key` is a queue name or a
    /// reply address
    async fn publish(&self, routing_key: &str, envelope: Envelope) -> Result<()>;

    /// Open this connection's reply subscription
    async fn subscribe_replies(&self) -> Result<ReplySubscription>;

    /// Start consuming a queue. Consumers on the same queue compete.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;
}

/// Shared broker handle
pub type SharedBroker = Arc<dyn Broker>;

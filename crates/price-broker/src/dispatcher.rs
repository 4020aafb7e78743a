//! # Request Dispatcher
//!
//! Synchronous-looking RPC over one-way publish/consume. One reply
//! subscription is opened per dispatcher and every call multiplexes onto it:
//!
//! ```text
//! call() ──register──▶ ReplyCorrelator ◀──deliver── reply loop ◀── replies
//!    │                       │
//!    └──publish(reply_to, correlation_id)──▶ job queue ──▶ Worker
//! ```
//!
//! Registration always happens before publishing, so a fast worker cannot
//! answer before someone is waiting. No call is retried here. When the reply
//! subscription is lost, calls waiting on it fail and the next call opens a
//! fresh subscription.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::correlator::ReplyCorrelator;
use crate::error::Result;
use crate::job::{JobKind, JobReply};
use crate::transport::{Envelope, ReplySubscription, SharedBroker};
use price_domain::{PriceQuote, ProductDetails};

/// Deadline applied by the typed helpers unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Product lookups the service needs from the worker fleet
#[async_trait]
pub trait ProductScraper: Send + Sync {
    async fn fetch_details(&self, reference: &str) -> Result<ProductDetails>;

    async fn fetch_price(&self, reference: &str) -> Result<PriceQuote>;
}

/// One reply subscription and the correlator fed by it
struct ReplyLink {
    correlator: ReplyCorrelator,
    reply_to: String,
    reply_loop: JoinHandle<()>,
}

impl ReplyLink {
    async fn open(broker: &SharedBroker) -> Result<Self> {
        let ReplySubscription { address, replies } = broker.subscribe_replies().await?;
        let correlator = ReplyCorrelator::new();
        let reply_loop = tokio::spawn(route_replies(replies, correlator.clone()));

        Ok(Self {
            correlator,
            reply_to: address,
            reply_loop,
        })
    }
}

impl Drop for ReplyLink {
    fn drop(&mut self) {
        self.reply_loop.abort();
    }
}

/// Publishes jobs and waits for their correlated replies
pub struct Dispatcher {
    broker: SharedBroker,
    link: Mutex<Arc<ReplyLink>>,
    reopen: AsyncMutex<()>,
    timeout: Duration,
}

impl Dispatcher {
    /// Open the reply subscription and start routing replies.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the subscription cannot be opened.
    pub async fn connect(broker: SharedBroker) -> Result<Self> {
        let link = ReplyLink::open(&broker).await?;
        tracing::info!(reply_to = %link.reply_to, "Dispatcher connected");

        Ok(Self {
            broker,
            link: Mutex::new(Arc::new(link)),
            reopen: AsyncMutex::new(()),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Deadline used by [`ProductScraper`] calls
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Correlator of the current reply subscription
    pub fn correlator(&self) -> ReplyCorrelator {
        self.current().correlator.clone()
    }

    pub fn reply_address(&self) -> String {
        self.current().reply_to.clone()
    }

    fn current(&self) -> Arc<ReplyLink> {
        self.link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, link: Arc<ReplyLink>) {
        *self.link.lock().unwrap_or_else(PoisonError::into_inner) = link;
    }

    /// The live reply subscription, reopened if the previous one was lost.
    /// Concurrent callers share a single resubscription.
    async fn live_link(&self) -> Result<Arc<ReplyLink>> {
        let link = self.current();
        if !link.correlator.is_closed() {
            return Ok(link);
        }

        let _reopening = self.reopen.lock().await;
        let link = self.current();
        if !link.correlator.is_closed() {
            return Ok(link);
        }

        let fresh = Arc::new(ReplyLink::open(&self.broker).await?);
        tracing::info!(reply_to = %fresh.reply_to, "Reply subscription reopened");
        self.replace(fresh.clone());
        Ok(fresh)
    }

    /// Publish `payload` to `routing_key` and return the raw reply body.
    ///
    /// # Errors
    ///
    /// [`BrokerError::Timeout`](crate::BrokerError::Timeout) when no reply
    /// arrives in time, [`BrokerError::Transport`](crate::BrokerError::Transport)
    /// when publishing fails or the reply subscription is lost.
    pub async fn call(
        &self,
        routing_key: &str,
        payload: impl Into<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let link = self.live_link().await?;
        let handle = link.correlator.register()?;
        let correlation_id = handle.correlation_id().to_string();

        let envelope = Envelope::new(payload).with_reply(link.reply_to.as_str(), correlation_id.as_str());
        self.broker.publish(routing_key, envelope).await?;
        tracing::debug!(routing_key, correlation_id = %correlation_id, "Job published");

        let reply = handle.wait(timeout).await;
        if let Err(e) = &reply {
            tracing::warn!(routing_key, correlation_id = %correlation_id, error = %e, "Call failed");
        }
        reply
    }

    /// Run a job and decode its tagged reply.
    ///
    /// # Errors
    ///
    /// Everything [`call`](Self::call) returns, plus
    /// [`BrokerError::Extraction`](crate::BrokerError::Extraction) for a
    /// failure reply and `Serialization` for an undecodable one.
    pub async fn request<T: DeserializeOwned>(
        &self,
        kind: JobKind,
        reference: &str,
        timeout: Duration,
    ) -> Result<T> {
        let body = self.call(kind.queue(), reference, timeout).await?;
        let reply: JobReply<T> = serde_json::from_slice(&body)?;
        reply.into_result()
    }
}

#[async_trait]
impl ProductScraper for Dispatcher {
    async fn fetch_details(&self, reference: &str) -> Result<ProductDetails> {
        self.request(JobKind::ProductData, reference, self.timeout).await
    }

    async fn fetch_price(&self, reference: &str) -> Result<PriceQuote> {
        self.request(JobKind::ProductPrice, reference, self.timeout).await
    }
}

async fn route_replies(mut replies: BoxStream<'static, Envelope>, correlator: ReplyCorrelator) {
    while let Some(reply) = replies.next().await {
        match reply.correlation_id {
            Some(correlation_id) => {
                correlator.deliver(&correlation_id, reply.body);
            }
            None => tracing::warn!("Dropping reply without correlation id"),
        }
    }

    tracing::error!("Reply subscription ended, failing pending calls");
    correlator.close();
}

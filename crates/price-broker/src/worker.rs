//! # Worker
//!
//! Consumes one durable job queue and processes one job at a time:
//!
//! ```text
//! Idle ──dequeue──▶ Processing ──extract, reply, ack──▶ Acknowledged
//!                                                   └─▶ AcknowledgedWithError
//! ```
//!
//! Every job is acknowledged after a single attempt. A failed extraction is
//! answered with a failure reply and then dropped; there is no requeue or
//! dead-letter routing.

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{BrokerError, Result};
use crate::extractor::SharedExtractor;
use crate::job::{JobKind, JobReply};
use crate::transport::{Delivery, Envelope, SharedBroker};

/// Where a worker loop is in its job cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Processing,
    Acknowledged,
    AcknowledgedWithError,
}

/// Single-job-at-a-time consumer of one queue
pub struct Worker {
    broker: SharedBroker,
    extractor: SharedExtractor,
    state: watch::Sender<JobState>,
}

impl Worker {
    pub fn new(broker: SharedBroker, extractor: SharedExtractor) -> Self {
        Self {
            broker,
            extractor,
            state: watch::Sender::new(JobState::Idle),
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Declare `kind`'s queue and process its jobs until the consumer ends.
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended consumption.
    pub async fn run(&self, kind: JobKind) -> Result<()> {
        self.broker.declare_queue(kind.queue()).await?;
        let mut deliveries = self.broker.consume(kind.queue()).await?;
        tracing::info!(queue = %kind, "Worker listening");

        while let Some(delivery) = deliveries.next().await {
            self.process(kind, delivery?).await;
            self.state.send_replace(JobState::Idle);
        }

        tracing::warn!(queue = %kind, "Job consumer ended");
        Ok(())
    }

    /// Extract, reply if asked to, then acknowledge. Never fails: errors
    /// are reported to the caller through the reply and the returned state.
    pub async fn process(&self, kind: JobKind, delivery: Delivery) -> JobState {
        self.state.send_replace(JobState::Processing);
        let envelope = delivery.envelope.clone();
        tracing::info!(queue = %kind, correlation_id = ?envelope.correlation_id, "Job received");

        let reply = match kind {
            JobKind::ProductData => self.extract_details(&envelope.body).await,
            JobKind::ProductPrice => self.extract_price(&envelope.body).await,
        };

        let state = match &reply {
            Ok(_) => JobState::Acknowledged,
            Err(reason) => {
                tracing::warn!(queue = %kind, reason = %reason, "Extraction failed");
                JobState::AcknowledgedWithError
            }
        };

        if let Some(reply_to) = envelope.reply_to {
            if let Err(e) = self.send_reply(&reply_to, envelope.correlation_id, reply).await {
                tracing::error!(queue = %kind, reply_to = %reply_to, error = %e, "Failed to publish reply");
            }
        }

        if let Err(e) = delivery.ack().await {
            tracing::error!(queue = %kind, error = %e, "Failed to acknowledge job");
        }

        self.state.send_replace(state);
        state
    }

    async fn extract_details(&self, payload: &[u8]) -> std::result::Result<serde_json::Value, String> {
        let reference = decode_reference(payload).map_err(|e| e.to_string())?;
        let details = self
            .extractor
            .fetch_details(&reference)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_value(details).map_err(|e| e.to_string())
    }

    async fn extract_price(&self, payload: &[u8]) -> std::result::Result<serde_json::Value, String> {
        let reference = decode_reference(payload).map_err(|e| e.to_string())?;
        let quote = self
            .extractor
            .fetch_price(&reference)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_value(quote).map_err(|e| e.to_string())
    }

    async fn send_reply<T: Serialize + Send>(
        &self,
        reply_to: &str,
        correlation_id: Option<String>,
        reply: std::result::Result<T, String>,
    ) -> Result<()> {
        let body = serde_json::to_vec(&JobReply::from(reply))?;
        self.broker
            .publish(reply_to, Envelope::reply(body, correlation_id))
            .await
    }
}

/// Job payloads are UTF-8 product references
fn decode_reference(payload: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| BrokerError::InvalidPayload("reference is not UTF-8".to_string()))?;
    price_domain::normalize_reference(text).map_err(|e| BrokerError::InvalidPayload(e.to_string()))
}

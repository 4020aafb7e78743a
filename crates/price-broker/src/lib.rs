//! # Price Broker Library
//!
//! Request/reply over a message broker that only offers one-way publish and
//! consume.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐                     ┌──────────────────────────┐
//! │        Dispatcher        │  get_product_data   │          Worker          │
//! │  register ─▶ publish ────┼──get_product_price─▶│  extract ─▶ reply ─▶ ack │
//! │      ▲                   │                     │                │         │
//! │      └─ ReplyCorrelator ◀┼──── reply_to ───────┼────────────────┘         │
//! └──────────────────────────┘  (correlation_id)   └──────────────────────────┘
//!                 │                                              │
//!                 └───────────── Broker (AMQP / memory) ─────────┘
//! ```
//!
//! ## Features
//!
//! - `amqp`: Enable the RabbitMQ transport (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use price_broker::{AmqpBroker, AmqpConfig, Dispatcher, ProductScraper};
//!
//! let broker = Arc::new(AmqpBroker::connect(&AmqpConfig::default()).await?);
//! let dispatcher = Dispatcher::connect(broker).await?;
//!
//! let quote = dispatcher.fetch_price("https://shop.example/p/tv-400123").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "amqp")]
pub mod amqp;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod job;
pub mod memory;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod testing;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpConfig};
pub use correlator::{ReplyCorrelator, ReplyHandle};
pub use dispatcher::{DEFAULT_TIMEOUT, Dispatcher, ProductScraper};
pub use error::{BrokerError, ExtractionError, Result};
pub use extractor::{Extractor, SharedExtractor};
pub use job::{JobKind, JobReply};
pub use memory::MemoryBroker;
pub use transport::{Broker, Delivery, Envelope, ReplySubscription, SharedBroker};
pub use worker::{JobState, Worker};

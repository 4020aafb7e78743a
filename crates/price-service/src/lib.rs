//! # Price Tracker Service
//!
//! Product price tracking on top of the cache-aside persistence layer and
//! the RPC-over-broker scrape dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API layer (external)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ProductService                          │
//! │      (ownership checks, invalidation sets, error mapping)    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                      │
//!          ▼                   ▼                      ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌──────────────────────┐
//! │   CacheAside    │ │ProductRepository│ │ Dispatcher (scrape)  │
//! │    (Redis)      │ │   (ScyllaDB)    │ │  ─▶ broker ─▶ Worker │
//! └─────────────────┘ └─────────────────┘ └──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod service;

pub use config::Config;
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use service::ProductService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Price Persistence Library
//!
//! Persistence layer for the price tracker: the product store (source of
//! truth) and the cache-aside coordination in front of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CacheAside                            │
//! │        (read-through on miss, invalidate after write)        │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │   CacheStore (Redis)    │   │  ProductRepository (Scylla)  │
//! │   JSON values + TTL     │   │   (Source of Truth)          │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `scylla`: Enable ScyllaDB backend (default)
//! - `redis`: Enable Redis cache store (default)
//!
//! In-memory implementations of both seams are always available.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use price_persistence::{CacheAside, CacheClient, CacheConfig, CacheKey};
//!
//! let cache = CacheClient::new(CacheConfig::default()).await?;
//! let layer = CacheAside::new(Arc::new(cache));
//!
//! let products = layer
//!     .read_through(CacheKey::ProductList, || repo.list_all())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
pub mod repository;
pub mod strategy;

// Re-export commonly used types
pub use cache::{CacheKey, CacheStore, DEFAULT_TTL, MemoryCache, SharedCacheStore};
#[cfg(feature = "redis")]
pub use cache::{CacheClient, CacheConfig};
pub use error::{PersistenceError, Result};
pub use repository::{MemoryProductRepository, ProductRepository, SharedProductRepository};
#[cfg(feature = "scylla")]
pub use repository::{ScyllaClient, ScyllaConfig, ScyllaProductRepository};
pub use strategy::{CacheAside, ReadStrategy, WriteStrategy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Strategy Module
//!
//! Enum-based cache/database access strategies and the cache-aside layer
//! built on them.
//!
//! ## Available Strategies
//!
//! ### Read Strategies
//! - `CacheFirst` - Check cache, fall back to DB on miss and repopulate (default)
//! - `DbOnly` - Skip cache entirely
//!
//! ### Write Strategies
//! - `WriteAround` - Commit to DB, then invalidate affected keys before returning (default)
//! - `DbOnly` - Write DB only, no cache interaction
//!
//! ## Example
//!
//! ```rust,ignore
//! use price_persistence::{CacheAside, CacheKey};
//!
//! let layer = CacheAside::new(store);
//! let product = layer
//!     .read_through(CacheKey::Product(id), || repo.get_by_id(id))
//!     .await?;
//! ```

pub mod cache_aside;
pub mod read_strategy;
pub mod write_strategy;

pub use cache_aside::CacheAside;
pub use read_strategy::ReadStrategy;
pub use write_strategy::WriteStrategy;

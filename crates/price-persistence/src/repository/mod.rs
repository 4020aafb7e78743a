//! # Repository Module
//!
//! Repository pattern implementations for product persistence.

pub mod memory;
#[cfg(feature = "scylla")]
pub mod scylla_impl;
pub mod traits;

pub use memory::MemoryProductRepository;
#[cfg(feature = "scylla")]
pub use scylla_impl::{ScyllaClient, ScyllaConfig, ScyllaProductRepository};
pub use traits::{ProductRepository, SharedProductRepository};

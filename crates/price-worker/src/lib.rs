//! # Price Worker
//!
//! Scrape job worker for the price tracker. Consumes the `get_product_data`
//! and `get_product_price` queues and answers each job on its reply address.
//!
//! ## Features
//!
//! - Storefront JSON extractor over HTTP
//! - Competing consumers per queue (`--concurrency`)
//! - One-shot RPC client for manual checks (`price-worker call`)

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod extractor;

pub use extractor::{DEFAULT_BASE_URL, HttpExtractor};

//! # Price Tracker - Domain Model
//!
//! Core entities and value objects for the product price tracker. These
//! types are shared by the persistence layer, the broker protocol and the
//! service layer, and they are what ends up serialized in cache entries and
//! job replies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTORS
// =============================================================================

/// Actor role as carried by the caller's credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// The identity a service operation is performed on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub const fn admin(id: i64) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub const fn user(id: i64) -> Self {
        Self {
            id,
            role: Role::User,
        }
    }

    /// Privileged actors see every owner's products
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Whether this actor may see an entity owned by `owner_id`
    #[must_use]
    pub const fn can_access(&self, owner_id: i64) -> bool {
        self.is_privileged() || self.id == owner_id
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Tracked product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub url: String,
    pub price: Option<f64>,
    pub owner_id: i64,
}

/// Fields of a product that does not have an identifier yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub url: String,
    pub price: Option<f64>,
    pub owner_id: i64,
}

impl NewProduct {
    /// Build a product from freshly extracted details.
    ///
    /// The rating is stored with two decimals.
    #[must_use]
    pub fn from_details(details: ProductDetails, owner_id: i64) -> Self {
        Self {
            name: Some(details.name),
            description: details.description,
            rating: details.rating.map(round_rating),
            url: details.url,
            price: Some(details.price),
            owner_id,
        }
    }

    #[must_use]
    pub fn with_id(self, id: i64) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            rating: self.rating,
            url: self.url,
            price: self.price,
            owner_id: self.owner_id,
        }
    }
}

/// One recorded price observation. Owned by its product; deleting the
/// product deletes its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// EXTRACTOR PAYLOADS
// =============================================================================

/// Full product attributes returned by the `get_product_data` job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub url: String,
    pub name: String,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub price: f64,
}

/// Current price returned by the `get_product_price` job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: f64,
}

// =============================================================================
// HELPERS
// =============================================================================

fn round_rating(rating: f64) -> f64 {
    (rating * 100.0).round() / 100.0
}

/// Trim a product reference and reject empty ones.
///
/// # Errors
///
/// Returns [`DomainError::InvalidReference`] when nothing is left after
/// trimming.
pub fn normalize_reference(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidReference(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid product reference: '{0}'")]
    InvalidReference(String),
}

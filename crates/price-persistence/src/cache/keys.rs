//! Cache key derivation.
//!
//! List views are keyed by scope, single-entity and sub-collection views by
//! entity id alone. Entity keys are shared across actors, so readers must
//! re-check ownership on whatever they get back.

use std::fmt;

use price_domain::Actor;

/// Every key namespace the cache-aside layer writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `products:list` - everything, as seen by privileged actors
    ProductList,
    /// `products:{owner}` - one owner's products
    OwnerProducts(i64),
    /// `product:{id}`
    Product(i64),
    /// `price_history:{id}`
    PriceHistory(i64),
}

impl CacheKey {
    /// Listing key for an actor: shared for privileged actors, owner-scoped
    /// otherwise.
    #[must_use]
    pub const fn listing_for(actor: &Actor) -> Self {
        if actor.is_privileged() {
            Self::ProductList
        } else {
            Self::OwnerProducts(actor.id)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductList => f.write_str("products:list"),
            Self::OwnerProducts(owner) => write!(f, "products:{owner}"),
            Self::Product(id) => write!(f, "product:{id}"),
            Self::PriceHistory(id) => write!(f, "price_history:{id}"),
        }
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(CacheKey::ProductList.to_string(), "products:list");
        assert_eq!(CacheKey::OwnerProducts(42).to_string(), "products:42");
        assert_eq!(CacheKey::Product(7).to_string(), "product:7");
        assert_eq!(CacheKey::PriceHistory(7).to_string(), "price_history:7");
    }

    #[test]
    fn test_listing_key_depends_on_role_only_for_users() {
        assert_eq!(CacheKey::listing_for(&Actor::admin(1)), CacheKey::ProductList);
        assert_eq!(CacheKey::listing_for(&Actor::admin(2)), CacheKey::ProductList);
        assert_eq!(
            CacheKey::listing_for(&Actor::user(5)),
            CacheKey::OwnerProducts(5)
        );
    }
}

//! # Storefront Extractor
//!
//! Reads product attributes from the storefront's JSON backend. A product
//! reference is the public product page url; its trailing `-<id>` segment is
//! the storefront product id.
//!
//! ```text
//! https://shop.example/products/oled-tv-400123
//!                                       └─────┘ product id
//!
//! GET {base}/product-details?multioffer=true&productId=400123
//!     body.name, body.rating.star, body.description
//! GET {base}/products/prices?addBonusRubles=true&isPromoApplied=true&productIds=400123
//!     body.materialPrices[0].price.salePrice
//! ```

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use price_broker::{ExtractionError, Extractor};
use price_domain::{PriceQuote, ProductDetails};

/// Storefront backend root
pub const DEFAULT_BASE_URL: &str = "https://www.mvideo.ru/bff";

/// Extractor backed by the storefront JSON API
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    base_url: String,
}

impl HttpExtractor {
    /// Build an extractor rooted at `base_url`. Requests carry no deadline
    /// unless `timeout` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Request`] when the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ExtractionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        reference: &str,
    ) -> Result<Value, ExtractionError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .header(REFERER, reference)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Storefront request rejected");
            return Err(ExtractionError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))
    }

    async fn current_price(&self, reference: &str, product_id: &str) -> Result<f64, ExtractionError> {
        let body = self
            .get_json(
                "/products/prices",
                &[
                    ("addBonusRubles", "true"),
                    ("isPromoApplied", "true"),
                    ("productIds", product_id),
                ],
                reference,
            )
            .await?;
        parse_price(&body)
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn fetch_details(&self, reference: &str) -> Result<ProductDetails, ExtractionError> {
        let product_id = product_id(reference)?;
        let body = self
            .get_json(
                "/product-details",
                &[("multioffer", "true"), ("productId", product_id)],
                reference,
            )
            .await?;
        let price = self.current_price(reference, product_id).await?;

        let details = parse_details(reference, &body, price)?;
        tracing::info!(product_id, name = %details.name, rating = ?details.rating, "Product details extracted");
        Ok(details)
    }

    async fn fetch_price(&self, reference: &str) -> Result<PriceQuote, ExtractionError> {
        let product_id = product_id(reference)?;
        let price = self.current_price(reference, product_id).await?;
        tracing::info!(product_id, price, "Product price extracted");
        Ok(PriceQuote { price })
    }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Storefront product id carried by a product page url
///
/// # Errors
///
/// Returns [`ExtractionError::UnsupportedReference`] when the url ends
/// without an id segment.
pub fn product_id(reference: &str) -> Result<&str, ExtractionError> {
    let path = reference.split(['?', '#']).next().unwrap_or_default();
    let id = path
        .trim_end_matches('/')
        .rsplit('-')
        .next()
        .unwrap_or_default();

    if id.is_empty() || id.contains('/') {
        return Err(ExtractionError::UnsupportedReference(reference.to_string()));
    }
    Ok(id)
}

/// Build [`ProductDetails`] from a `product-details` response.
///
/// # Errors
///
/// Returns [`ExtractionError::MissingField`] when the product name is absent.
pub fn parse_details(reference: &str, body: &Value, price: f64) -> Result<ProductDetails, ExtractionError> {
    let product = &body["body"];
    let name = product["name"]
        .as_str()
        .ok_or(ExtractionError::MissingField("body.name"))?;

    Ok(ProductDetails {
        url: reference.to_string(),
        name: name.to_string(),
        rating: product["rating"]["star"].as_f64(),
        description: product["description"]
            .as_str()
            .filter(|text| !text.is_empty())
            .map(String::from),
        price,
    })
}

/// Sale price from a `products/prices` response.
///
/// # Errors
///
/// Returns [`ExtractionError::MissingField`] when no sale price is listed.
pub fn parse_price(body: &Value) -> Result<f64, ExtractionError> {
    body["body"]["materialPrices"][0]["price"]["salePrice"]
        .as_f64()
        .ok_or(ExtractionError::MissingField("body.materialPrices[0].price.salePrice"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_id_from_trailing_segment() {
        assert_eq!(
            product_id("https://www.mvideo.ru/products/televizor-lg-oled55-400123").unwrap(),
            "400123"
        );
        assert_eq!(
            product_id("https://www.mvideo.ru/products/smartfon-30074325/?from=search").unwrap(),
            "30074325"
        );
        assert_eq!(product_id("30074325").unwrap(), "30074325");
    }

    #[test]
    fn test_product_id_requires_segment() {
        let err = product_id("https://www.mvideo.ru/products/").unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedReference(_)));

        let err = product_id("https://www.mvideo.ru/catalog").unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedReference(_)));
    }

    #[test]
    fn test_parse_details() {
        let body = json!({
            "success": true,
            "body": {
                "productId": "400123",
                "name": "Телевизор LG OLED55",
                "rating": { "star": 4.8667, "count": 15 },
                "description": "OLED panel, 4K"
            }
        });

        let details = parse_details("https://shop.example/p/tv-400123", &body, 89_999.0).unwrap();
        assert_eq!(details.url, "https://shop.example/p/tv-400123");
        assert_eq!(details.name, "Телевизор LG OLED55");
        assert_eq!(details.rating, Some(4.8667));
        assert_eq!(details.description.as_deref(), Some("OLED panel, 4K"));
        assert_eq!(details.price, 89_999.0);
    }

    #[test]
    fn test_parse_details_tolerates_missing_rating() {
        let body = json!({ "body": { "name": "Cable", "rating": null, "description": "" } });

        let details = parse_details("ref-1", &body, 9.0).unwrap();
        assert_eq!(details.rating, None);
        assert_eq!(details.description, None);
    }

    #[test]
    fn test_parse_details_requires_name() {
        let body = json!({ "body": { "rating": { "star": 5 } } });
        assert_eq!(
            parse_details("ref-1", &body, 9.0).unwrap_err(),
            ExtractionError::MissingField("body.name")
        );
    }

    #[test]
    fn test_parse_price() {
        let body = json!({
            "body": {
                "materialPrices": [
                    { "productId": "400123", "price": { "basePrice": 99_999, "salePrice": 89_999 } }
                ]
            }
        });
        assert_eq!(parse_price(&body).unwrap(), 89_999.0);

        let empty = json!({ "body": { "materialPrices": [] } });
        assert!(matches!(parse_price(&empty), Err(ExtractionError::MissingField(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let extractor = HttpExtractor::new("http://127.0.0.1:9/bff/", Some(Duration::from_secs(1))).unwrap();
        assert_eq!(extractor.base_url(), "http://127.0.0.1:9/bff");
    }

    #[tokio::test]
    async fn test_unreachable_storefront_is_request_error() {
        let extractor = HttpExtractor::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        let err = tokio_test::assert_err!(extractor.fetch_price("https://shop.example/p/tv-400123").await);
        assert!(matches!(err, ExtractionError::Request(_)));
    }
}

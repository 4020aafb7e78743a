//! ScyllaDB repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::frame::response::result::{CqlValue, Row};
use scylla::frame::value::CqlTimestamp;
use scylla::{Session, SessionBuilder};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use super::traits::ProductRepository;
use crate::error::{PersistenceError, Result};
use price_domain::{NewProduct, PriceHistoryEntry, Product};

/// Schema applied by [`ScyllaClient::migrate`]. `products_by_url` backs the
/// unique-reference lookup; history is clustered by time per product.
pub const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS products (
        id bigint PRIMARY KEY,
        name text,
        description text,
        rating double,
        url text,
        price double,
        owner_id bigint
    )",
    "CREATE INDEX IF NOT EXISTS products_owner_idx ON products (owner_id)",
    r"CREATE TABLE IF NOT EXISTS products_by_url (
        url text PRIMARY KEY,
        id bigint
    )",
    r"CREATE TABLE IF NOT EXISTS price_history (
        product_id bigint,
        recorded_at timestamp,
        id bigint,
        price double,
        PRIMARY KEY (product_id, recorded_at, id)
    ) WITH CLUSTERING ORDER BY (recorded_at ASC, id ASC)",
];

const PRODUCT_COLUMNS: &str = "id, name, description, rating, url, price, owner_id";

type ProductRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<f64>,
    String,
    Option<f64>,
    i64,
);

type HistoryRow = (i64, i64, f64, CqlTimestamp);

// =============================================================================
// SCYLLA CONFIGURATION
// =============================================================================

/// ScyllaDB connection configuration.
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1:9042".to_string()],
            keyspace: "price_tracker".to_string(),
            username: None,
            password: None,
        }
    }
}

// =============================================================================
// SCYLLA CLIENT
// =============================================================================

/// ScyllaDB client wrapper.
pub struct ScyllaClient {
    session: Arc<Session>,
    pub config: ScyllaConfig,
}

impl ScyllaClient {
    /// Create a new ScyllaDB client bound to the configured keyspace.
    pub async fn new(config: ScyllaConfig) -> Result<Self> {
        let mut builder = SessionBuilder::new().known_nodes(&config.hosts);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.user(user, pass);
        }

        let session = builder.build().await?;
        session.use_keyspace(&config.keyspace, false).await?;

        Ok(Self {
            session: Arc::new(session),
            config,
        })
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            self.session.query_unpaged(*statement, ()).await?;
        }
        tracing::info!(keyspace = %self.config.keyspace, "Schema up to date");
        Ok(())
    }
}

fn scylla_err(err: impl Display) -> PersistenceError {
    PersistenceError::Scylla(err.to_string())
}

/// `[applied]` flag of a conditional write result row.
fn applied(row: &Row) -> bool {
    matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))))
}

fn product_from_row(row: ProductRow) -> Product {
    let (id, name, description, rating, url, price, owner_id) = row;
    Product {
        id,
        name,
        description,
        rating,
        url,
        price,
        owner_id,
    }
}

fn history_from_row(row: HistoryRow) -> PriceHistoryEntry {
    let (id, product_id, price, recorded_at) = row;
    PriceHistoryEntry {
        id,
        product_id,
        price,
        recorded_at: DateTime::from_timestamp_millis(recorded_at.0).unwrap_or_default(),
    }
}

// =============================================================================
// ID ALLOCATION
// =============================================================================

/// Monotonic, time-ordered ids (microseconds since epoch).
///
/// Unique within one process; separate writer processes must not create
/// rows within the same microsecond.
#[derive(Debug, Default)]
struct IdAllocator {
    last: AtomicI64,
}

impl IdAllocator {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

// =============================================================================
// PRODUCT REPOSITORY
// =============================================================================

/// Repository for products and price history.
pub struct ScyllaProductRepository {
    client: Arc<ScyllaClient>,
    ids: IdAllocator,
}

impl ScyllaProductRepository {
    /// Create a new product repository.
    pub fn new(client: Arc<ScyllaClient>) -> Self {
        Self {
            client,
            ids: IdAllocator::default(),
        }
    }

    async fn query_products(&self, query: String, owner_id: Option<i64>) -> Result<Vec<Product>> {
        let result = match owner_id {
            Some(owner_id) => self.client.session.query_unpaged(query, (owner_id,)).await?,
            None => self.client.session.query_unpaged(query, ()).await?,
        };

        let rows = result.into_rows_result().map_err(scylla_err)?;
        rows.rows::<ProductRow>()
            .map_err(scylla_err)?
            .map(|row| row.map(product_from_row).map_err(scylla_err))
            .collect()
    }
}

#[async_trait]
impl ProductRepository for ScyllaProductRepository {
    async fn list_all(&self) -> Result<Vec<Product>> {
        self.query_products(format!("SELECT {PRODUCT_COLUMNS} FROM products"), None)
            .await
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Product>> {
        self.query_products(
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = ?"),
            Some(owner_id),
        )
        .await
    }

    async fn get_by_id(&self, product_id: i64) -> Result<Product> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let result = self
            .client
            .session
            .query_unpaged(query, (product_id,))
            .await?;

        result
            .into_rows_result()
            .map_err(scylla_err)?
            .maybe_first_row::<ProductRow>()
            .map_err(scylla_err)?
            .map(product_from_row)
            .ok_or_else(|| PersistenceError::not_found("product", product_id))
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Product>> {
        let result = self
            .client
            .session
            .query_unpaged("SELECT id FROM products_by_url WHERE url = ?", (url,))
            .await?;

        let id = result
            .into_rows_result()
            .map_err(scylla_err)?
            .maybe_first_row::<(i64,)>()
            .map_err(scylla_err)?;

        match id {
            Some((id,)) => match self.get_by_id(id).await {
                Ok(product) => Ok(Some(product)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    async fn create(&self, product: NewProduct) -> Result<Product> {
        let product = product.with_id(self.ids.next());
        let session = &self.client.session;

        let claim = session
            .query_unpaged(
                "INSERT INTO products_by_url (url, id) VALUES (?, ?) IF NOT EXISTS",
                (&product.url, product.id),
            )
            .await?;
        let row = claim
            .into_rows_result()
            .map_err(scylla_err)?
            .first_row::<Row>()
            .map_err(scylla_err)?;

        if !applied(&row) {
            return Err(PersistenceError::Conflict(format!(
                "product with url {} already exists",
                product.url
            )));
        }

        let insert = format!("INSERT INTO products ({PRODUCT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)");
        let inserted = session
            .query_unpaged(
                insert,
                (
                    product.id,
                    &product.name,
                    &product.description,
                    product.rating,
                    &product.url,
                    product.price,
                    product.owner_id,
                ),
            )
            .await;

        if let Err(e) = inserted {
            if let Err(release) = session
                .query_unpaged("DELETE FROM products_by_url WHERE url = ?", (&product.url,))
                .await
            {
                tracing::warn!(url = %product.url, error = %release, "Url claim not released");
            }
            return Err(e.into());
        }

        tracing::debug!(product_id = product.id, url = %product.url, "Product inserted");
        Ok(product)
    }

    async fn delete(&self, product_id: i64) -> Result<Product> {
        let product = self.get_by_id(product_id).await?;
        let session = &self.client.session;

        session
            .query_unpaged("DELETE FROM price_history WHERE product_id = ?", (product_id,))
            .await?;
        session
            .query_unpaged("DELETE FROM products_by_url WHERE url = ?", (&product.url,))
            .await?;
        session
            .query_unpaged("DELETE FROM products WHERE id = ?", (product_id,))
            .await?;

        Ok(product)
    }

    async fn append_history(&self, product_id: i64, price: f64) -> Result<Vec<PriceHistoryEntry>> {
        self.get_by_id(product_id).await?;

        let recorded_at = CqlTimestamp(Utc::now().timestamp_millis());
        self.client
            .session
            .query_unpaged(
                "INSERT INTO price_history (product_id, recorded_at, id, price) VALUES (?, ?, ?, ?)",
                (product_id, recorded_at, self.ids.next(), price),
            )
            .await?;

        self.price_history(product_id).await
    }

    async fn price_history(&self, product_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        let result = self
            .client
            .session
            .query_unpaged(
                "SELECT id, product_id, price, recorded_at FROM price_history WHERE product_id = ?",
                (product_id,),
            )
            .await?;

        let rows = result.into_rows_result().map_err(scylla_err)?;
        rows.rows::<HistoryRow>()
            .map_err(scylla_err)?
            .map(|row| row.map(history_from_row).map_err(scylla_err))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_strictly_increasing() {
        let ids = IdAllocator::default();
        let mut previous = ids.next();
        for _ in 0..1000 {
            let next = ids.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_conditional_write_flag() {
        let claimed = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        assert!(applied(&claimed));

        let taken = Row {
            columns: vec![
                Some(CqlValue::Boolean(false)),
                Some(CqlValue::Text("https://shop.example/p/tv-400123".to_string())),
                Some(CqlValue::BigInt(7)),
            ],
        };
        assert!(!applied(&taken));
        assert!(!applied(&Row { columns: vec![] }));
    }

    #[test]
    fn test_history_row_conversion() {
        let entry = history_from_row((3, 7, 450.0, CqlTimestamp(1_727_286_340_000)));
        assert_eq!(entry.product_id, 7);
        assert_eq!(entry.recorded_at.timestamp(), 1_727_286_340);
    }
}

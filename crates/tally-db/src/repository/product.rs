//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Key Operations
//! - CRUD operations
//! - Low-stock listing
//! - In-transaction stock reservation used by the Sale Ledger
//!
//! ## Stock Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Check-and-Decrement in ONE Statement                 │
//! │                                                                         │
//! │  ❌ WRONG: read, compare in Rust, then write                           │
//! │     SELECT stock ...            (two sales both read 10)               │
//! │     UPDATE ... SET stock = 0    (both write, 20 units sold)            │
//! │                                                                         │
//! │  ✅ CORRECT: conditional update                                        │
//! │     UPDATE products SET stock = stock - ?qty                           │
//! │     WHERE id = ?id AND stock >= ?qty                                   │
//! │     RETURNING name, price_cents, stock                                 │
//! │                                                                         │
//! │  0 rows → lookup_stock() tells "no such product" from "not enough"     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::validation::{validate_low_stock_threshold, validate_new_product};
use tally_core::{Money, NewProduct, Product};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let product = repo.create(&NewProduct { .. }).await?;
/// let low = repo.list_low_stock(5).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists all products, newest first.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, sku, price_cents, stock, created_at, updated_at
            FROM products
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, sku, price_cents, stock, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, sku, price_cents, stock, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::Validation)` - Bad name, SKU, price or stock
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            price_cents: input.price_cents,
            stock: input.stock,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, price_cents, stock, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, &product.sku))?;

        Ok(product)
    }

    /// Replaces the editable fields of a product and bumps `updated_at`.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The product as stored after the update
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    /// * `Err(DbError::UniqueViolation)` - SKU taken by another product
    pub async fn update(&self, id: &str, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;

        debug!(id = %id, "Updating product");

        let sku = input.sku.trim();
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = ?2,
                sku = ?3,
                price_cents = ?4,
                stock = ?5,
                updated_at = ?6
            WHERE id = ?1
            RETURNING id, name, sku, price_cents, stock, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(sku)
        .bind(input.price_cents)
        .bind(input.stock)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, sku))?;

        product.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    /// * `Err(DbError::ForeignKeyViolation)` - Sales reference it; nothing deleted
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::ForeignKeyViolation { .. } => DbError::ForeignKeyViolation {
                    message: format!("product {id} is referenced by recorded sales"),
                },
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists products with `stock <= threshold`, lowest stock first, ties by id.
    pub async fn list_low_stock(&self, threshold: i64) -> DbResult<Vec<Product>> {
        validate_low_stock_threshold(threshold)?;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, sku, price_cents, stock, created_at, updated_at
            FROM products
            WHERE stock <= ?1
            ORDER BY stock ASC, id ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        debug!(threshold, count = products.len(), "Listed low-stock products");
        Ok(products)
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// In-transaction catalog contract
// =============================================================================

/// What a successful reservation tells the ledger about the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReservation {
    pub product_name: String,
    pub unit_price: Money,
    /// Stock left after this reservation.
    pub remaining: i64,
}

/// Atomically takes `quantity` units of a product, if that many are on hand.
///
/// Runs on the caller's connection, so it belongs to the caller's
/// transaction and is undone by its rollback. Stock is never floored at
/// zero: a short product is left untouched.
///
/// ## Returns
/// * `Ok(Some(_))` - Stock decremented
/// * `Ok(None)` - Product missing or short; see [`lookup_stock`]
pub async fn reserve_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<StockReservation>> {
    let row: Option<(String, i64, i64)> = sqlx::query_as(
        r#"
        UPDATE products
        SET stock = stock - ?1, updated_at = ?3
        WHERE id = ?2 AND stock >= ?1
        RETURNING name, price_cents, stock
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(product_name, price_cents, remaining)| StockReservation {
        product_name,
        unit_price: Money::from_cents(price_cents),
        remaining,
    }))
}

/// Reads a product's current stock on the caller's connection.
///
/// `None` means the product does not exist.
pub async fn lookup_stock(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Option<i64>> {
    let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(stock)
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

fn sku_conflict(err: sqlx::Error, sku: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", sku),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    use super::*;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_product(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            name: format!("Product {sku}"),
            sku: sku.to_string(),
            price_cents: 500,
            stock,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let created = repo.create(&new_product("COF-1", 10)).await.unwrap();
        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(created, fetched);

        let by_sku = repo.get_by_sku("COF-1").await.unwrap().unwrap();
        assert_eq!(by_sku.id, created.id);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let db = test_db().await;
        let mut input = new_product("COF-1", 10);
        input.price_cents = -1;

        let err = db.products().create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = test_db().await;
        let repo = db.products();
        repo.create(&new_product("COF-1", 10)).await.unwrap();

        let err = repo.create(&new_product("COF-1", 3)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_update() {
        let db = test_db().await;
        let repo = db.products();
        let created = repo.create(&new_product("COF-1", 10)).await.unwrap();

        let mut input = new_product("COF-2", 4);
        input.name = "Espresso".to_string();
        let updated = repo.update(&created.id, &input).await.unwrap();

        assert_eq!(updated.name, "Espresso");
        assert_eq!(updated.sku, "COF-2");
        assert_eq!(updated.stock, 4);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let err = repo.update("missing", &input).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let repo = db.products();
        let created = repo.create(&new_product("COF-1", 10)).await.unwrap();

        repo.delete(&created.id).await.unwrap();
        assert!(repo.get(&created.id).await.unwrap().is_none());

        let err = repo.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = test_db().await;
        let repo = db.products();
        let a = repo.create(&new_product("A-1", 1)).await.unwrap();
        let b = repo.create(&new_product("B-1", 1)).await.unwrap();

        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_low_stock_ordering() {
        let db = test_db().await;
        let repo = db.products();
        let x = repo.create(&new_product("X-1", 2)).await.unwrap();
        let y = repo.create(&new_product("Y-1", 2)).await.unwrap();
        let z = repo.create(&new_product("Z-1", 0)).await.unwrap();
        repo.create(&new_product("W-1", 6)).await.unwrap();

        let low = repo.list_low_stock(5).await.unwrap();
        assert_eq!(low.len(), 3);
        assert_eq!(low[0].id, z.id);

        // Equal stock falls back to ascending id.
        let mut tied = vec![x.id, y.id];
        tied.sort();
        assert_eq!(vec![low[1].id.clone(), low[2].id.clone()], tied);

        assert!(repo.list_low_stock(-1).await.is_err());
    }

    #[tokio::test]
    async fn test_reserve_stock_never_goes_negative() {
        let db = test_db().await;
        let product = db.products().create(&new_product("COF-1", 3)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();

        let reserved = reserve_stock(&mut conn, &product.id, 2, now).await.unwrap().unwrap();
        assert_eq!(reserved.remaining, 1);
        assert_eq!(reserved.unit_price.cents(), 500);
        assert_eq!(reserved.product_name, "Product COF-1");

        assert!(reserve_stock(&mut conn, &product.id, 2, now).await.unwrap().is_none());
        assert_eq!(lookup_stock(&mut conn, &product.id).await.unwrap(), Some(1));

        assert!(reserve_stock(&mut conn, "missing", 1, now).await.unwrap().is_none());
        assert_eq!(lookup_stock(&mut conn, "missing").await.unwrap(), None);
    }
}

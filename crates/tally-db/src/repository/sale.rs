//! # Sale Repository (Sale Ledger)
//!
//! Records sales atomically and reads them back.
//!
//! ## create_sale Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Sale = One Transaction                        │
//! │                                                                         │
//! │  validate request (no storage touched)                                 │
//! │       │                                                                 │
//! │  BEGIN ─┐                                                               │
//! │         │  for each line, in request order:                             │
//! │         │    reserve_stock()  UPDATE ... WHERE stock >= qty RETURNING   │
//! │         │      ├── 0 rows + no product  → ProductNotFound               │
//! │         │      ├── 0 rows + product     → InsufficientStock             │
//! │         │      └── ok → price line, add to running total               │
//! │         │                                                               │
//! │         │  INSERT sales        (total, paid, method, created_at)        │
//! │         │  INSERT sale_items   (name snapshot, same created_at)         │
//! │  COMMIT ┘                                                               │
//! │                                                                         │
//! │  Any `?` before COMMIT drops the transaction → ROLLBACK.               │
//! │  No sale, no items, no stock change is left behind.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The first statement inside the transaction is a write, so SQLite hands
//! out its single write lock before any stock value is read. Competing sales
//! queue on the busy timeout and each sees the stock the previous one left.
//! A product repeated across lines is reserved once per line, so repeated
//! lines compound.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult, SaleError};
use crate::repository::product::{lookup_stock, reserve_stock};
use tally_core::validation::validate_sale_request;
use tally_core::{CoreError, CreateSale, Money, Sale, SaleDraft, SaleItem};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Validates, prices and commits a sale, decrementing stock.
    ///
    /// ## Arguments
    /// * `request` - Lines (product, quantity, optional price override),
    ///   payment method and amount paid
    ///
    /// ## Returns
    /// * `Ok(Sale)` - Exactly what was committed, items in request order
    /// * `Err(SaleError)` - Nothing was committed; see [`SaleError::kind`]
    pub async fn create_sale(&self, request: &CreateSale) -> Result<Sale, SaleError> {
        validate_sale_request(request)?;

        let now = Utc::now();
        let sale_id = generate_sale_id();

        let mut tx = self.pool.begin().await?;
        let mut draft = SaleDraft::new();

        for line in &request.items {
            let reservation =
                match reserve_stock(&mut tx, &line.product_id, line.quantity, now).await? {
                    Some(reservation) => reservation,
                    None => {
                        let rejection = match lookup_stock(&mut tx, &line.product_id).await? {
                            None => CoreError::ProductNotFound(line.product_id.clone()),
                            Some(available) => CoreError::InsufficientStock {
                                product_id: line.product_id.clone(),
                                available,
                                requested: line.quantity,
                            },
                        };
                        warn!(sale_id = %sale_id, error = %rejection, "Sale rejected");
                        return Err(rejection.into());
                    }
                };

            let priced = draft.add_line(reservation.product_name, reservation.unit_price, line)?;
            debug!(
                product_id = %priced.product_id,
                quantity = priced.quantity,
                line_total = %priced.line_total,
                remaining = reservation.remaining,
                "Sale line reserved"
            );
        }

        let sale = draft.into_sale(
            sale_id,
            request.payment_method.trim().to_string(),
            Money::from_cents(request.paid_cents),
            now,
            generate_sale_item_id,
        );

        sqlx::query(
            r#"
            INSERT INTO sales (id, total_cents, paid_cents, payment_method, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.total_cents)
        .bind(sale.paid_cents)
        .bind(&sale.payment_method)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &sale.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, product_name,
                    quantity, unit_price_cents, line_total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            items = sale.items.len(),
            total = %sale.total(),
            payment_method = %sale.payment_method,
            "Sale committed"
        );

        Ok(sale)
    }

    /// Gets a sale and its items by sale ID.
    pub async fn get_sale(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, total_cents, paid_cents, payment_method, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut sale) = sale else {
            return Ok(None);
        };

        sale.items = self.get_items(id).await?;
        Ok(Some(sale))
    }

    /// Lists all sales with their items, most recent first.
    pub async fn list_sales(&self) -> DbResult<Vec<Sale>> {
        let mut sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, total_cents, paid_cents, payment_method, created_at
            FROM sales
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, product_name,
                   quantity, unit_price_cents, line_total_cents, created_at
            FROM sale_items
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
        for item in items {
            by_sale.entry(item.sale_id.clone()).or_default().push(item);
        }
        for sale in &mut sales {
            sale.items = by_sale.remove(&sale.id).unwrap_or_default();
        }

        debug!(count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Gets the items of a sale in line order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, product_name,
                   quantity, unit_price_cents, line_total_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Counts committed sales (for diagnostics).
    pub async fn count_sales(&self) -> DbResult<i64> {
        count(&self.pool, "SELECT COUNT(*) FROM sales").await
    }

    /// Counts committed sale items (for diagnostics).
    pub async fn count_sale_items(&self) -> DbResult<i64> {
        count(&self.pool, "SELECT COUNT(*) FROM sale_items").await
    }
}

async fn count(pool: &SqlitePool, sql: &str) -> DbResult<i64> {
    sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .map_err(DbError::from)
}

/// Helper to generate a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new sale item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tally_core::{NewProduct, Product, SaleLineRequest};

    use crate::error::SaleErrorKind;
    use crate::{Database, DbConfig};

    use super::*;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn add_product(db: &Database, sku: &str, price_cents: i64, stock: i64) -> Product {
        db.products()
            .create(&NewProduct {
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                price_cents,
                stock,
            })
            .await
            .unwrap()
    }

    fn request(items: Vec<SaleLineRequest>, paid_cents: i64) -> CreateSale {
        CreateSale {
            items,
            payment_method: "cash".to_string(),
            paid_cents,
        }
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().get(id).await.unwrap().unwrap().stock
    }

    async fn counts(db: &Database) -> (i64, i64) {
        (
            db.sales().count_sales().await.unwrap(),
            db.sales().count_sale_items().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_sale_prices_line_and_decrements_stock() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let sale = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 3)], 1500))
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 1500);
        assert_eq!(sale.paid_cents, 1500);
        assert_eq!(sale.payment_method, "cash");
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].unit_price_cents, 500);
        assert_eq!(sale.items[0].line_total_cents, 1500);
        assert_eq!(sale.items[0].product_name, "Product A-1");
        assert_eq!(stock_of(&db, &a.id).await, 7);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_unchanged() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let err = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 11)], 0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SaleErrorKind::InsufficientStock);
        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::InsufficientStock { available: 10, requested: 11, .. })
        ));
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_missing_product_creates_no_sale() {
        let db = test_db().await;

        let err = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new("no-such-product", 1)], 0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SaleErrorKind::ProductNotFound);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_override_price_is_used() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let sale = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 2).with_override(400)], 800))
            .await
            .unwrap();

        assert_eq!(sale.items[0].unit_price_cents, 400);
        assert_eq!(sale.items[0].line_total_cents, 800);
        assert_eq!(sale.total_cents, 800);
    }

    #[tokio::test]
    async fn test_late_failure_rolls_back_earlier_lines() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;
        let b = add_product(&db, "B-1", 250, 1).await;

        let err = db
            .sales()
            .create_sale(&request(
                vec![SaleLineRequest::new(&a.id, 4), SaleLineRequest::new(&b.id, 2)],
                0,
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SaleErrorKind::InsufficientStock);
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(stock_of(&db, &b.id).await, 1);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_storage_failure_after_reservation_rolls_back() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 5).await;

        // Stock is reserved before the first item row is written
        sqlx::query(
            "CREATE TRIGGER reject_items BEFORE INSERT ON sale_items \
             BEGIN SELECT RAISE(ABORT, 'item insert rejected'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 2)], 1000))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SaleErrorKind::StorageFailure);
        assert_eq!(stock_of(&db, &a.id).await, 5);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let cases = vec![
            request(vec![], 0),
            request(vec![SaleLineRequest::new(&a.id, 0)], 0),
            request(vec![SaleLineRequest::new(&a.id, 1)], -5),
            CreateSale {
                items: vec![SaleLineRequest::new(&a.id, 1)],
                payment_method: " ".to_string(),
                paid_cents: 0,
            },
        ];

        for case in &cases {
            let err = db.sales().create_sale(case).await.unwrap_err();
            assert_eq!(err.kind(), SaleErrorKind::InvalidRequest);
        }
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_line_overflow_rolls_back() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", i64::MAX / 2, 10).await;

        let err = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 3)], 0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), SaleErrorKind::InvalidRequest);
        assert_eq!(stock_of(&db, &a.id).await, 10);
        assert_eq!(counts(&db).await, (0, 0));
    }

    #[tokio::test]
    async fn test_repeated_product_lines_compound() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 100, 5).await;

        let sale = db
            .sales()
            .create_sale(&request(
                vec![SaleLineRequest::new(&a.id, 3), SaleLineRequest::new(&a.id, 2)],
                500,
            ))
            .await
            .unwrap();
        assert_eq!(sale.items.len(), 2);
        assert_eq!(stock_of(&db, &a.id).await, 0);

        // 3 + 3 > 4 even though each line alone fits.
        let b = add_product(&db, "B-1", 100, 4).await;
        let err = db
            .sales()
            .create_sale(&request(
                vec![SaleLineRequest::new(&b.id, 3), SaleLineRequest::new(&b.id, 3)],
                0,
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::InsufficientStock { available: 1, requested: 3, .. })
        ));
        assert_eq!(stock_of(&db, &b.id).await, 4);
    }

    #[tokio::test]
    async fn test_total_is_sum_of_lines_and_timestamps_shared() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 333, 50).await;
        let b = add_product(&db, "B-1", 199, 50).await;
        let c = add_product(&db, "C-1", 1, 50).await;

        let sale = db
            .sales()
            .create_sale(&request(
                vec![
                    SaleLineRequest::new(&a.id, 3),
                    SaleLineRequest::new(&b.id, 7),
                    SaleLineRequest::new(&c.id, 13).with_override(17),
                ],
                10_000,
            ))
            .await
            .unwrap();

        let sum: i64 = sale.items.iter().map(|i| i.line_total_cents).sum();
        assert_eq!(sale.total_cents, sum);
        assert!(sale.items.iter().all(|i| i.created_at == sale.created_at));

        let stored = db.sales().get_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored, sale);
        assert!(stored.items.iter().all(|i| i.created_at == stored.created_at));
    }

    #[tokio::test]
    async fn test_paid_amount_not_tied_to_total() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let sale = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 2)], 100))
            .await
            .unwrap();
        assert_eq!(sale.paid_cents, 100);
        assert_eq!(sale.change_due().cents(), -900);
    }

    #[tokio::test]
    async fn test_get_sale_is_idempotent_and_keeps_name_snapshot() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let sale = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 1)], 500))
            .await
            .unwrap();

        let first = db.sales().get_sale(&sale.id).await.unwrap();
        let second = db.sales().get_sale(&sale.id).await.unwrap();
        assert_eq!(first, second);

        db.products()
            .update(
                &a.id,
                &NewProduct {
                    name: "Renamed".to_string(),
                    sku: "A-1".to_string(),
                    price_cents: 900,
                    stock: 9,
                },
            )
            .await
            .unwrap();

        let after = db.sales().get_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(after.items[0].product_name, "Product A-1");
        assert_eq!(after.items[0].unit_price_cents, 500);
        assert!(db.sales().get_sale("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sales_most_recent_first_with_items() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;

        let first = db
            .sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 1)], 500))
            .await
            .unwrap();
        let second = db
            .sales()
            .create_sale(&request(
                vec![SaleLineRequest::new(&a.id, 1), SaleLineRequest::new(&a.id, 2)],
                1500,
            ))
            .await
            .unwrap();

        let sales = db.sales().list_sales().await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0], second);
        assert_eq!(sales[1], first);
        assert_eq!(sales[0].items[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_sold_product_cannot_be_deleted() {
        let db = test_db().await;
        let a = add_product(&db, "A-1", 500, 10).await;
        db.sales()
            .create_sale(&request(vec![SaleLineRequest::new(&a.id, 1)], 500))
            .await
            .unwrap();

        let err = db.products().delete(&a.id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.products().get(&a.id).await.unwrap().is_some());
    }

    /// N concurrent sales of N units against stock N: exactly one wins.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        const N: i64 = 8;

        let path = std::env::temp_dir().join(format!("tally-ledger-{}.db", Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(N as u32)
                .busy_timeout(std::time::Duration::from_secs(30)),
        )
        .await
        .unwrap();
        let product = add_product(&db, "HOT-1", 100, N).await;

        let db = Arc::new(db);
        let mut handles = Vec::new();
        for _ in 0..N {
            let db = Arc::clone(&db);
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                db.sales()
                    .create_sale(&request(vec![SaleLineRequest::new(product_id, N)], N * 100))
                    .await
            }));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => {
                    assert_eq!(err.kind(), SaleErrorKind::InsufficientStock, "{err}");
                    insufficient += 1;
                }
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(insufficient, N - 1);
        assert_eq!(stock_of(&db, &product.id).await, 0);
        assert_eq!(counts(&db).await, (1, 1));

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}

//! # Report Repository
//!
//! Read-only aggregations over committed sales.
//!
//! Every query takes a half-open window `[from, to)` of UTC instants.
//! Timestamps are stored as RFC 3339 UTC strings, so the window is a plain
//! string range and the calendar day is the first ten characters.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::validation::validate_report_limit;
use tally_core::{DailySales, SalesSummary, TopProduct};

/// Repository for sales reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Number of sales, revenue and units sold in the window.
    ///
    /// Revenue sums sale totals, so a sale with many lines counts once.
    pub async fn summary(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<SalesSummary> {
        debug!(%from, %to, "Building sales summary");

        let summary = sqlx::query_as::<_, SalesSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sales
                  WHERE created_at >= ?1 AND created_at < ?2) AS total_sales,
                (SELECT COALESCE(SUM(total_cents), 0) FROM sales
                  WHERE created_at >= ?1 AND created_at < ?2) AS total_revenue_cents,
                (SELECT COALESCE(SUM(si.quantity), 0)
                   FROM sale_items si
                   JOIN sales s ON s.id = si.sale_id
                  WHERE s.created_at >= ?1 AND s.created_at < ?2) AS total_items
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Sales and revenue per UTC calendar day, oldest day first.
    pub async fn daily(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<DailySales>> {
        let rows = sqlx::query_as::<_, DailySales>(
            r#"
            SELECT
                substr(created_at, 1, 10) AS date,
                COUNT(*) AS total_sales,
                COALESCE(SUM(total_cents), 0) AS total_revenue_cents
            FROM sales
            WHERE created_at >= ?1 AND created_at < ?2
            GROUP BY substr(created_at, 1, 10)
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        debug!(days = rows.len(), "Built daily sales report");
        Ok(rows)
    }

    /// Best-selling products by revenue, ties broken by product id.
    ///
    /// `limit` must be positive.
    pub async fn top_products(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<TopProduct>> {
        validate_report_limit(limit)?;

        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT
                si.product_id AS product_id,
                p.name AS product_name,
                SUM(si.quantity) AS quantity,
                SUM(si.line_total_cents) AS revenue_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE s.created_at >= ?1 AND s.created_at < ?2
            GROUP BY si.product_id, p.name
            ORDER BY revenue_cents DESC, si.product_id ASC
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(limit, count = rows.len(), "Built top products report");
        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tally_core::{CreateSale, NewProduct, Product, SaleLineRequest};

    use crate::{Database, DbConfig};

    use super::*;

    async fn add_product(db: &Database, sku: &str, price_cents: i64) -> Product {
        db.products()
            .create(&NewProduct {
                name: format!("Product {sku}"),
                sku: sku.to_string(),
                price_cents,
                stock: 100,
            })
            .await
            .unwrap()
    }

    async fn sell(db: &Database, lines: Vec<SaleLineRequest>) {
        db.sales()
            .create_sale(&CreateSale {
                items: lines,
                payment_method: "cash".to_string(),
                paid_cents: 0,
            })
            .await
            .unwrap();
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::days(1), now + Duration::days(1))
    }

    #[tokio::test]
    async fn test_summary_counts_each_sale_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = add_product(&db, "A-1", 500).await;
        let b = add_product(&db, "B-1", 200).await;

        sell(&db, vec![SaleLineRequest::new(&a.id, 2), SaleLineRequest::new(&b.id, 3)]).await;
        sell(&db, vec![SaleLineRequest::new(&b.id, 1)]).await;

        let (from, to) = window();
        let summary = db.reports().summary(from, to).await.unwrap();
        assert_eq!(
            summary,
            SalesSummary {
                total_sales: 2,
                total_revenue_cents: 1000 + 600 + 200,
                total_items: 6,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = add_product(&db, "A-1", 500).await;
        sell(&db, vec![SaleLineRequest::new(&a.id, 1)]).await;

        let from = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap();

        let summary = db.reports().summary(from, to).await.unwrap();
        assert_eq!(summary.total_sales, 0);
        assert_eq!(summary.total_revenue_cents, 0);
        assert!(db.reports().daily(from, to).await.unwrap().is_empty());
        assert!(db.reports().top_products(from, to, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_groups_by_utc_date() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = add_product(&db, "A-1", 500).await;
        sell(&db, vec![SaleLineRequest::new(&a.id, 1)]).await;
        sell(&db, vec![SaleLineRequest::new(&a.id, 2)]).await;

        let (from, to) = window();
        let days = db.reports().daily(from, to).await.unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, Utc::now().format("%Y-%m-%d").to_string());
        assert_eq!(days[0].total_sales, 2);
        assert_eq!(days[0].total_revenue_cents, 1500);
    }

    #[tokio::test]
    async fn test_top_products_by_revenue() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cheap = add_product(&db, "CHEAP", 100).await;
        let pricey = add_product(&db, "PRICEY", 1000).await;
        let mid = add_product(&db, "MID", 300).await;

        sell(&db, vec![SaleLineRequest::new(&cheap.id, 5), SaleLineRequest::new(&pricey.id, 1)])
            .await;
        sell(&db, vec![SaleLineRequest::new(&pricey.id, 1), SaleLineRequest::new(&mid.id, 1)])
            .await;

        let (from, to) = window();
        let top = db.reports().top_products(from, to, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, pricey.id);
        assert_eq!(top[0].quantity, 2);
        assert_eq!(top[0].revenue_cents, 2000);
        assert_eq!(top[1].product_id, cheap.id);
        assert_eq!(top[1].revenue_cents, 500);

        assert!(db.reports().top_products(from, to, 0).await.is_err());
    }
}

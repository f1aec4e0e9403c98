//! Postgres-backed record store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Second unresolved alert for a `(product, kind)`, duplicate SKU |
//! | Database (other) | Any other | `Unavailable` | Constraint or server failures |
//! | PoolClosed / Io / Tls / other | N/A | `Unavailable` | Connectivity failures |
//! | Row decode failures | N/A | `Corrupt` | Stored values outside the domain (e.g. unknown alert kind) |
//!
//! ## Atomicity
//!
//! `replace_horizon` deletes and re-inserts inside one transaction, so readers see
//! either the old or the new horizon. Alert deduplication is enforced by the partial
//! unique index `alerts_one_unresolved` on `(product_id, kind) WHERE NOT resolved`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use smartstock_ai::ForecastPoint;
use smartstock_core::{AlertId, ForecastRunId, ProductId, SaleId, YearMonth};
use smartstock_inventory::{Product, SalesRecord};

use super::{AlertStore, CatalogStore, ForecastStore, MonthlyTotal, SalesStore, StoreError, StoreResult};
use crate::alerts::{Alert, AlertKind, Severity};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id            UUID PRIMARY KEY,
        sku           TEXT NOT NULL UNIQUE,
        name          TEXT NOT NULL,
        category      TEXT NOT NULL,
        current_stock BIGINT NOT NULL CHECK (current_stock >= 0),
        threshold     BIGINT NOT NULL CHECK (threshold >= 0),
        price         DOUBLE PRECISION NOT NULL,
        last_updated  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id         UUID PRIMARY KEY,
        product_id UUID NOT NULL,
        sku        TEXT NOT NULL,
        quantity   BIGINT NOT NULL CHECK (quantity >= 0),
        amount     DOUBLE PRECISION NOT NULL,
        sold_at    TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS sales_product_idx ON sales (product_id)",
    r#"
    CREATE TABLE IF NOT EXISTS forecasts (
        run_id             UUID NOT NULL,
        product_id         UUID NOT NULL,
        sku                TEXT NOT NULL,
        date               DATE NOT NULL,
        predicted_quantity DOUBLE PRECISION NOT NULL,
        predicted_amount   DOUBLE PRECISION NOT NULL,
        confidence_lower   DOUBLE PRECISION NOT NULL,
        confidence_upper   DOUBLE PRECISION NOT NULL,
        created_at         TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (product_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id           UUID PRIMARY KEY,
        product_id   UUID NOT NULL,
        product_name TEXT NOT NULL,
        kind         TEXT NOT NULL,
        severity     TEXT NOT NULL,
        message      TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        resolved     BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS alerts_one_unresolved
        ON alerts (product_id, kind) WHERE NOT resolved
    "#,
];

/// Postgres-backed [`super::RecordStore`].
///
/// `PgPool` is internally reference-counted; cloning the store is cheap.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and return a store over a fresh pool.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for PostgresRecordStore {
    #[instrument(skip(self), err)]
    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sku, name, category, current_stock, threshold, price, last_updated
            FROM products
            ORDER BY sku ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product = %id), err)]
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, category, current_stock, threshold, price, last_updated
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, category, current_stock, threshold, price, last_updated
            FROM products
            WHERE sku = $1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_by_sku", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, product), fields(product = %product.id, sku = %product.sku), err)]
    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, category, current_stock, threshold, price, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                sku = EXCLUDED.sku,
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                current_stock = EXCLUDED.current_stock,
                threshold = EXCLUDED.threshold,
                price = EXCLUDED.price,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.current_stock)
        .bind(product.threshold)
        .bind(product.price)
        .bind(product.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_product", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl SalesStore for PostgresRecordStore {
    #[instrument(skip(self), fields(product = %product_id), err)]
    async fn sales_for_product(&self, product_id: ProductId) -> StoreResult<Vec<SalesRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, sku, quantity, amount, sold_at
            FROM sales
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("sales_for_product", e))?;

        rows.iter().map(sale_from_row).collect()
    }

    #[instrument(skip(self, sale), fields(sale = %sale.id, product = %sale.product_id), err)]
    async fn insert_sale(&self, sale: &SalesRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (id, product_id, sku, quantity, amount, sold_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.product_id.as_uuid())
        .bind(&sale.sku)
        .bind(i64::from(sale.quantity))
        .bind(sale.amount)
        .bind(sale.sold_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn sales_totals_by_month(&self, since: DateTime<Utc>) -> StoreResult<Vec<MonthlyTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT
                EXTRACT(YEAR FROM sold_at AT TIME ZONE 'UTC')::INT AS year,
                EXTRACT(MONTH FROM sold_at AT TIME ZONE 'UTC')::INT AS month,
                SUM(amount) AS total
            FROM sales
            WHERE sold_at >= $1
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("sales_totals_by_month", e))?;

        rows.iter().map(monthly_total_from_row).collect()
    }
}

#[async_trait::async_trait]
impl ForecastStore for PostgresRecordStore {
    #[instrument(skip(self, points), fields(product = %product_id, points = points.len()), err)]
    async fn replace_horizon(&self, product_id: ProductId, points: &[ForecastPoint]) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("DELETE FROM forecasts WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_horizon", e))?;

        for point in points {
            sqlx::query(
                r#"
                INSERT INTO forecasts (
                    run_id,
                    product_id,
                    sku,
                    date,
                    predicted_quantity,
                    predicted_amount,
                    confidence_lower,
                    confidence_upper,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(point.run_id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(&point.sku)
            .bind(point.date)
            .bind(point.predicted_quantity)
            .bind(point.predicted_amount)
            .bind(point.confidence_lower)
            .bind(point.confidence_upper)
            .bind(point.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_forecast", e))?;
        }

        // Dropping `tx` on any error above rolls back; the old horizon stays intact.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(product = %product_id), err)]
    async fn horizon(&self, product_id: ProductId) -> StoreResult<Vec<ForecastPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT
                run_id,
                product_id,
                sku,
                date,
                predicted_quantity,
                predicted_amount,
                confidence_lower,
                confidence_upper,
                created_at
            FROM forecasts
            WHERE product_id = $1
            ORDER BY date ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("horizon", e))?;

        rows.iter().map(point_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn forecast_totals_by_month(&self, since: NaiveDate) -> StoreResult<Vec<MonthlyTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT
                EXTRACT(YEAR FROM date)::INT AS year,
                EXTRACT(MONTH FROM date)::INT AS month,
                SUM(predicted_amount) AS total
            FROM forecasts
            WHERE date >= $1
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("forecast_totals_by_month", e))?;

        rows.iter().map(monthly_total_from_row).collect()
    }
}

#[async_trait::async_trait]
impl AlertStore for PostgresRecordStore {
    #[instrument(skip(self), fields(product = %product_id, kind = %kind), err)]
    async fn find_unresolved(&self, product_id: ProductId, kind: AlertKind) -> StoreResult<Option<Alert>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, product_name, kind, severity, message, created_at, resolved
            FROM alerts
            WHERE product_id = $1 AND kind = $2 AND NOT resolved
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_unresolved", e))?;

        row.as_ref().map(alert_from_row).transpose()
    }

    #[instrument(skip(self, alert), fields(alert = %alert.id, product = %alert.product_id, kind = %alert.kind), err)]
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, product_id, product_name, kind, severity, message, created_at, resolved)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(alert.id.as_uuid())
        .bind(alert.product_id.as_uuid())
        .bind(&alert.product_name)
        .bind(alert.kind.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.created_at)
        .bind(alert.resolved)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_alert", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(alert = %id), err)]
    async fn resolve_alert(&self, id: AlertId) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE alerts SET resolved = TRUE WHERE id = $1 AND NOT resolved")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_alert", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn active_alerts(&self, limit: usize) -> StoreResult<Vec<Alert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, product_name, kind, severity, message, created_at, resolved
            FROM alerts
            WHERE NOT resolved
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("active_alerts", e))?;

        rows.iter().map(alert_from_row).collect()
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("failed to read {name}: {e}")))
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(column::<Uuid>(row, "id")?),
        sku: column(row, "sku")?,
        name: column(row, "name")?,
        category: column(row, "category")?,
        current_stock: column(row, "current_stock")?,
        threshold: column(row, "threshold")?,
        price: column(row, "price")?,
        last_updated: column(row, "last_updated")?,
    })
}

fn sale_from_row(row: &PgRow) -> StoreResult<SalesRecord> {
    let quantity: i64 = column(row, "quantity")?;
    Ok(SalesRecord {
        id: SaleId::from_uuid(column::<Uuid>(row, "id")?),
        product_id: ProductId::from_uuid(column::<Uuid>(row, "product_id")?),
        sku: column(row, "sku")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("sale quantity out of range: {quantity}")))?,
        amount: column(row, "amount")?,
        sold_at: column(row, "sold_at")?,
    })
}

fn point_from_row(row: &PgRow) -> StoreResult<ForecastPoint> {
    Ok(ForecastPoint {
        run_id: ForecastRunId::from_uuid(column::<Uuid>(row, "run_id")?),
        product_id: ProductId::from_uuid(column::<Uuid>(row, "product_id")?),
        sku: column(row, "sku")?,
        date: column(row, "date")?,
        predicted_quantity: column(row, "predicted_quantity")?,
        predicted_amount: column(row, "predicted_amount")?,
        confidence_lower: column(row, "confidence_lower")?,
        confidence_upper: column(row, "confidence_upper")?,
        created_at: column(row, "created_at")?,
    })
}

fn alert_from_row(row: &PgRow) -> StoreResult<Alert> {
    let kind: String = column(row, "kind")?;
    let severity: String = column(row, "severity")?;
    Ok(Alert {
        id: AlertId::from_uuid(column::<Uuid>(row, "id")?),
        product_id: ProductId::from_uuid(column::<Uuid>(row, "product_id")?),
        product_name: column(row, "product_name")?,
        kind: AlertKind::parse(&kind).ok_or_else(|| StoreError::Corrupt(format!("unknown alert kind: {kind}")))?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown alert severity: {severity}")))?,
        message: column(row, "message")?,
        created_at: column(row, "created_at")?,
        resolved: column(row, "resolved")?,
    })
}

fn monthly_total_from_row(row: &PgRow) -> StoreResult<MonthlyTotal> {
    let year: i32 = column(row, "year")?;
    let month: i32 = column(row, "month")?;
    let month = u32::try_from(month)
        .ok()
        .and_then(|m| YearMonth::new(year, m).ok())
        .ok_or_else(|| StoreError::Corrupt(format!("invalid month {year}-{month}")))?;
    let total: Option<f64> = column(row, "total")?;
    Ok(MonthlyTotal {
        month,
        total: total.unwrap_or(0.0),
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if is_unique_violation(db_err.code().as_deref()) {
                StoreError::Duplicate(msg)
            } else {
                StoreError::Unavailable(msg)
            }
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {}", operation)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(code: Option<&str>) -> bool {
    code == Some("23505")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_code_is_recognised() {
        assert!(is_unique_violation(Some("23505")));
        assert!(!is_unique_violation(Some("23503")));
        assert!(!is_unique_violation(None));
    }

    #[test]
    fn pool_closed_is_unavailable() {
        match map_sqlx_error("horizon", sqlx::Error::PoolClosed) {
            StoreError::Unavailable(msg) => assert!(msg.contains("horizon")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn schema_enforces_one_unresolved_alert_per_kind() {
        let index = SCHEMA
            .iter()
            .find(|s| s.contains("alerts_one_unresolved"))
            .expect("partial unique index present");
        assert!(index.contains("UNIQUE"));
        assert!(index.contains("WHERE NOT resolved"));
    }
}

//! Record store contract.
//!
//! The services depend only on these traits; the backing technology (in-memory for
//! dev/tests, Postgres for deployments) is chosen at startup.
//!
//! Guarantees every implementation must provide:
//! - [`ForecastStore::replace_horizon`] is atomic: readers see the old horizon or the
//!   new one, never a mix.
//! - [`AlertStore::insert_alert`] rejects a second unresolved alert for the same
//!   `(product, kind)` with [`StoreError::Duplicate`].

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use smartstock_ai::ForecastPoint;
use smartstock_core::{AlertId, ProductId, YearMonth};
use smartstock_inventory::{Product, SalesRecord};

use crate::alerts::{Alert, AlertKind};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity or backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sum of a monetary amount over one calendar month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyTotal {
    pub month: YearMonth,
    pub total: f64,
}

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;

    async fn product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>>;

    /// Insert or replace by id. A different product with the same SKU is a duplicate.
    async fn upsert_product(&self, product: &Product) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait SalesStore: Send + Sync {
    /// All sales of one product, in no particular order.
    async fn sales_for_product(&self, product_id: ProductId) -> StoreResult<Vec<SalesRecord>>;

    async fn insert_sale(&self, sale: &SalesRecord) -> StoreResult<()>;

    /// Sale amounts grouped by UTC calendar month, for sales at or after `since`.
    async fn sales_totals_by_month(&self, since: DateTime<Utc>) -> StoreResult<Vec<MonthlyTotal>>;
}

#[async_trait::async_trait]
pub trait ForecastStore: Send + Sync {
    /// Atomically replace the whole horizon of `product_id` with `points`.
    async fn replace_horizon(&self, product_id: ProductId, points: &[ForecastPoint]) -> StoreResult<()>;

    /// The persisted horizon, ordered by date.
    async fn horizon(&self, product_id: ProductId) -> StoreResult<Vec<ForecastPoint>>;

    /// Predicted amounts grouped by calendar month, for dates on or after `since`.
    async fn forecast_totals_by_month(&self, since: NaiveDate) -> StoreResult<Vec<MonthlyTotal>>;
}

#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn find_unresolved(&self, product_id: ProductId, kind: AlertKind) -> StoreResult<Option<Alert>>;

    /// Fails with [`StoreError::Duplicate`] when an unresolved alert of the same kind
    /// already exists for the product.
    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()>;

    /// Mark an alert resolved. `false` when the id is unknown or already resolved.
    async fn resolve_alert(&self, id: AlertId) -> StoreResult<bool>;

    /// Unresolved alerts, newest first.
    async fn active_alerts(&self, limit: usize) -> StoreResult<Vec<Alert>>;
}

/// Everything the services need from one backing store.
pub trait RecordStore: CatalogStore + SalesStore + ForecastStore + AlertStore {}

impl<T> RecordStore for T where T: CatalogStore + SalesStore + ForecastStore + AlertStore + ?Sized {}

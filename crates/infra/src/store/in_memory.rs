use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};

use smartstock_ai::ForecastPoint;
use smartstock_core::{AlertId, ProductId, YearMonth};
use smartstock_inventory::{Product, SalesRecord};

use super::{AlertStore, CatalogStore, ForecastStore, MonthlyTotal, SalesStore, StoreError, StoreResult};
use crate::alerts::{Alert, AlertKind};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    sales: Vec<SalesRecord>,
    horizons: HashMap<ProductId, Vec<ForecastPoint>>,
    alerts: Vec<Alert>,
}

/// In-memory record store for tests/dev.
///
/// One lock guards all collections, so every write (including a horizon replace
/// and the alert uniqueness check + insert) is atomic.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<State>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn totals(entries: impl Iterator<Item = (YearMonth, f64)>) -> Vec<MonthlyTotal> {
    let mut by_month: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for (month, amount) in entries {
        *by_month.entry(month).or_insert(0.0) += amount;
    }
    by_month
        .into_iter()
        .map(|(month, total)| MonthlyTotal { month, total })
        .collect()
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryRecordStore {
    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let state = self.read()?;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn product_by_sku(&self, sku: &str) -> StoreResult<Option<Product>> {
        Ok(self.read()?.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.write()?;
        if state
            .products
            .values()
            .any(|p| p.sku == product.sku && p.id != product.id)
        {
            return Err(StoreError::Duplicate(format!("sku {} already exists", product.sku)));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl SalesStore for InMemoryRecordStore {
    async fn sales_for_product(&self, product_id: ProductId) -> StoreResult<Vec<SalesRecord>> {
        Ok(self
            .read()?
            .sales
            .iter()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn insert_sale(&self, sale: &SalesRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.sales.iter().any(|s| s.id == sale.id) {
            return Err(StoreError::Duplicate(format!("sale {} already exists", sale.id)));
        }
        state.sales.push(sale.clone());
        Ok(())
    }

    async fn sales_totals_by_month(&self, since: DateTime<Utc>) -> StoreResult<Vec<MonthlyTotal>> {
        let state = self.read()?;
        Ok(totals(
            state
                .sales
                .iter()
                .filter(|s| s.sold_at >= since)
                .map(|s| (YearMonth::of(s.sold_at), s.amount)),
        ))
    }
}

#[async_trait::async_trait]
impl ForecastStore for InMemoryRecordStore {
    async fn replace_horizon(&self, product_id: ProductId, points: &[ForecastPoint]) -> StoreResult<()> {
        let mut horizon = points.to_vec();
        horizon.sort_by_key(|p| p.date);
        self.write()?.horizons.insert(product_id, horizon);
        Ok(())
    }

    async fn horizon(&self, product_id: ProductId) -> StoreResult<Vec<ForecastPoint>> {
        Ok(self
            .read()?
            .horizons
            .get(&product_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn forecast_totals_by_month(&self, since: NaiveDate) -> StoreResult<Vec<MonthlyTotal>> {
        let state = self.read()?;
        Ok(totals(
            state
                .horizons
                .values()
                .flatten()
                .filter(|p| p.date >= since)
                .map(|p| (YearMonth::of_date(p.date), p.predicted_amount)),
        ))
    }
}

#[async_trait::async_trait]
impl AlertStore for InMemoryRecordStore {
    async fn find_unresolved(&self, product_id: ProductId, kind: AlertKind) -> StoreResult<Option<Alert>> {
        Ok(self
            .read()?
            .alerts
            .iter()
            .find(|a| a.product_id == product_id && a.kind == kind && !a.resolved)
            .cloned())
    }

    async fn insert_alert(&self, alert: &Alert) -> StoreResult<()> {
        let mut state = self.write()?;
        let open = state
            .alerts
            .iter()
            .any(|a| a.product_id == alert.product_id && a.kind == alert.kind && !a.resolved);
        if open && !alert.resolved {
            return Err(StoreError::Duplicate(format!(
                "unresolved {} alert already exists for product {}",
                alert.kind, alert.product_id
            )));
        }
        state.alerts.push(alert.clone());
        Ok(())
    }

    async fn resolve_alert(&self, id: AlertId) -> StoreResult<bool> {
        let mut state = self.write()?;
        match state.alerts.iter_mut().find(|a| a.id == id && !a.resolved) {
            Some(alert) => {
                alert.resolved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_alerts(&self, limit: usize) -> StoreResult<Vec<Alert>> {
        let state = self.read()?;
        let mut active: Vec<_> = state.alerts.iter().filter(|a| !a.resolved).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active.truncate(limit);
        Ok(active)
    }
}

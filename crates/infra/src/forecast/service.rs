use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use smartstock_ai::{ForecastEngine, ForecastOutcome, ForecastPoint, ForecastSubject, SaleObservation};
use smartstock_core::ProductId;
use smartstock_inventory::Product;

use super::MAX_HORIZON_DAYS;
use super::locks::ProductLocks;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{CatalogStore, ForecastStore, RecordStore, SalesStore};

/// Counters from one catalog-wide refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    /// Refreshed products whose horizon came from the baseline model.
    pub fallbacks: usize,
    pub failed: usize,
}

/// Generates forecasts from stored sales and persists them.
///
/// Create once at startup and share by `Arc`; the per-product write locks only
/// serialize persists that go through the same instance.
pub struct ForecastService<S: ?Sized> {
    store: Arc<S>,
    engine: ForecastEngine,
    locks: ProductLocks,
}

impl<S> ForecastService<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            engine: ForecastEngine::new(),
            locks: ProductLocks::new(),
        }
    }

    pub fn with_engine(mut self, engine: ForecastEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Forecast `horizon_days` consecutive days for the product with `sku`.
    ///
    /// Model failures are not errors: the horizon then comes from the baseline model.
    pub async fn generate_forecast(&self, sku: &str, horizon_days: usize) -> ServiceResult<Vec<ForecastPoint>> {
        validate_horizon(horizon_days)?;
        let product = self.product_by_sku(sku).await?;
        Ok(self.generate_for(&product, horizon_days).await?.into_points())
    }

    /// Replace the stored horizon of `product_id` with `points`.
    ///
    /// `points` must all belong to `product_id` and to a single generation run. An
    /// empty list clears the horizon.
    pub async fn persist_forecast(&self, product_id: ProductId, points: Vec<ForecastPoint>) -> ServiceResult<()> {
        if let Some(foreign) = points.iter().find(|p| p.product_id != product_id) {
            return Err(ServiceError::validation(format!(
                "forecast point for product {} cannot be stored under product {product_id}",
                foreign.product_id
            )));
        }
        if let Some(first) = points.first() {
            if points.iter().any(|p| p.run_id != first.run_id) {
                return Err(ServiceError::validation("forecast points come from more than one run"));
            }
        }

        let _guard = self.locks.lock(product_id).await;
        self.store.replace_horizon(product_id, &points).await?;
        debug!(product = %product_id, points = points.len(), "forecast horizon replaced");
        Ok(())
    }

    /// Regenerate and persist the horizon of every product in the catalog.
    ///
    /// A product that fails is logged and counted; the others still refresh. Only a
    /// failure to list the catalog is returned as an error.
    pub async fn refresh_catalog(&self, horizon_days: usize) -> ServiceResult<RefreshSummary> {
        validate_horizon(horizon_days)?;
        let products = self.store.list_products().await?;
        let mut summary = RefreshSummary::default();

        for product in &products {
            match self.refresh_product(product, horizon_days).await {
                Ok(outcome) => {
                    summary.refreshed += 1;
                    if outcome.fallback_reason.is_some() {
                        summary.fallbacks += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(sku = %product.sku, product = %product.id, error = %e, "forecast refresh failed");
                }
            }
        }

        info!(
            products = products.len(),
            refreshed = summary.refreshed,
            fallbacks = summary.fallbacks,
            failed = summary.failed,
            horizon_days,
            "forecast refresh complete"
        );
        Ok(summary)
    }

    /// The first `limit` points of the stored horizon for `sku`.
    pub async fn forecast_for(&self, sku: &str, limit: usize) -> ServiceResult<Vec<ForecastPoint>> {
        let product = self.product_by_sku(sku).await?;
        let mut points = self.store.horizon(product.id).await?;
        points.truncate(limit);
        Ok(points)
    }

    async fn refresh_product(&self, product: &Product, horizon_days: usize) -> ServiceResult<ForecastOutcome> {
        let outcome = self.generate_for(product, horizon_days).await?;
        let _guard = self.locks.lock(product.id).await;
        self.store.replace_horizon(product.id, &outcome.points).await?;
        Ok(outcome)
    }

    async fn product_by_sku(&self, sku: &str) -> ServiceResult<Product> {
        self.store
            .product_by_sku(sku)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("product {sku}")))
    }

    async fn generate_for(&self, product: &Product, horizon_days: usize) -> ServiceResult<ForecastOutcome> {
        let history: Vec<SaleObservation> = self
            .store
            .sales_for_product(product.id)
            .await?
            .iter()
            .map(|s| SaleObservation::new(s.sold_at, s.quantity))
            .collect();

        let subject = ForecastSubject {
            product_id: product.id,
            sku: product.sku.clone(),
            unit_price: product.price,
        };
        let outcome = self.engine.generate(&subject, &history, horizon_days, Utc::now());

        match &outcome.fallback_reason {
            Some(reason) if reason.is_model_failure() => {
                warn!(sku = %product.sku, error = %reason, "autoregressive fit failed, using baseline for the full horizon");
            }
            Some(reason) => {
                debug!(sku = %product.sku, reason = %reason, "using baseline model");
            }
            None => {
                debug!(sku = %product.sku, model = outcome.model.as_str(), records = history.len(), "forecast generated");
            }
        }
        Ok(outcome)
    }
}

fn validate_horizon(horizon_days: usize) -> ServiceResult<()> {
    if !(1..=MAX_HORIZON_DAYS).contains(&horizon_days) {
        return Err(ServiceError::validation(format!(
            "horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {horizon_days}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use chrono::{Duration, Utc};
    use smartstock_ai::ModelKind;

    async fn store_with(products: &[Product]) -> Arc<InMemoryRecordStore> {
        let store = Arc::new(InMemoryRecordStore::new());
        for p in products {
            store.upsert_product(p).await.unwrap();
        }
        store
    }

    fn product(sku: &str, stock: i64) -> Product {
        Product::new(sku, format!("Product {sku}"), "Electronics", stock, 20, 10.0, Utc::now()).unwrap()
    }

    /// One sale a day for `days` days, ending yesterday.
    async fn record_daily_sales(store: &InMemoryRecordStore, product: &mut Product, days: i64) {
        for d in (1..=days).rev() {
            let sale = product.sell(((d % 4) + 1) as u32, Utc::now() - Duration::days(d)).unwrap();
            store.insert_sale(&sale).await.unwrap();
        }
    }

    #[tokio::test]
    async fn unknown_sku_is_not_found() {
        let service = ForecastService::new(store_with(&[]).await);
        let err = service.generate_forecast("PROD-404", 30).await.unwrap_err();
        match err {
            ServiceError::NotFound(what) => assert!(what.contains("PROD-404")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn horizon_must_be_positive_and_bounded() {
        let p = product("PROD-001", 50);
        let service = ForecastService::new(store_with(&[p]).await);
        assert!(matches!(service.generate_forecast("PROD-001", 0).await, Err(ServiceError::Validation(_))));
        assert!(matches!(
            service.generate_forecast("PROD-001", MAX_HORIZON_DAYS + 1).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn product_without_history_gets_a_baseline_horizon() {
        let p = product("PROD-001", 50);
        let service = ForecastService::new(store_with(&[p.clone()]).await);

        let points = service.generate_forecast("PROD-001", 90).await.unwrap();

        assert_eq!(points.len(), 90);
        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        assert_eq!(points[0].date, tomorrow);
        assert!(points.iter().all(|pt| pt.product_id == p.id));
        assert!(points.iter().all(|pt| (pt.predicted_amount - pt.predicted_quantity * 10.0).abs() < 1e-9));
    }

    #[tokio::test]
    async fn persist_then_read_returns_exactly_the_new_horizon() {
        let mut p = product("PROD-002", 5_000);
        let store = store_with(&[p.clone()]).await;
        record_daily_sales(&store, &mut p, 60).await;
        let service = ForecastService::new(store.clone());

        let first = service.generate_forecast("PROD-002", 30).await.unwrap();
        service.persist_forecast(p.id, first).await.unwrap();

        let second = service.generate_forecast("PROD-002", 7).await.unwrap();
        service.persist_forecast(p.id, second.clone()).await.unwrap();

        assert_eq!(store.horizon(p.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn persist_rejects_points_of_another_product() {
        let a = product("PROD-003", 50);
        let b = product("PROD-004", 50);
        let service = ForecastService::new(store_with(&[a.clone(), b.clone()]).await);

        let points = service.generate_forecast("PROD-003", 7).await.unwrap();
        let err = service.persist_forecast(b.id, points).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn concurrent_persists_never_mix_runs() {
        let p = product("PROD-005", 50);
        let store = store_with(&[p.clone()]).await;
        let service = Arc::new(ForecastService::new(store.clone()));
        let product_id = p.id;

        let mut tasks = Vec::new();
        for horizon in [5usize, 10, 15, 20, 25, 30] {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let points = service.generate_forecast("PROD-005", horizon).await.unwrap();
                service.persist_forecast(product_id, points).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = store.horizon(p.id).await.unwrap();
        let run = stored[0].run_id;
        assert!(stored.iter().all(|pt| pt.run_id == run));
        assert!([5, 10, 15, 20, 25, 30].contains(&stored.len()));
    }

    #[tokio::test]
    async fn refresh_catalog_persists_every_product() {
        let mut a = product("PROD-006", 5_000);
        let b = product("PROD-007", 50);
        let store = store_with(&[a.clone(), b.clone()]).await;
        record_daily_sales(&store, &mut a, 60).await;
        let service = ForecastService::new(store.clone());

        let summary = service.refresh_catalog(14).await.unwrap();

        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.fallbacks >= 1);
        assert_eq!(store.horizon(a.id).await.unwrap().len(), 14);
        assert_eq!(store.horizon(b.id).await.unwrap().len(), 14);
    }

    #[tokio::test]
    async fn forecast_for_returns_the_leading_points() {
        let p = product("PROD-008", 50);
        let service = ForecastService::new(store_with(&[p]).await);
        service.refresh_catalog(30).await.unwrap();

        let points = service.forecast_for("PROD-008", 7).await.unwrap();
        assert_eq!(points.len(), 7);
        for pair in points.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[tokio::test]
    async fn rich_history_uses_the_autoregressive_model_or_reports_why_not() {
        let mut p = product("PROD-009", 5_000);
        let store = store_with(&[p.clone()]).await;
        record_daily_sales(&store, &mut p, 90).await;
        let service = ForecastService::new(store);

        let outcome = service.generate_for(&p, 30).await.unwrap();
        match outcome.model {
            ModelKind::Autoregressive => assert!(outcome.fallback_reason.is_none()),
            ModelKind::Baseline => assert!(outcome.fallback_reason.unwrap().is_model_failure()),
        }
        assert_eq!(outcome.points.len(), 30);
    }
}

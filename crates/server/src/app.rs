use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use smartstock_infra::alerts::AlertEvaluator;
use smartstock_infra::config::AppConfig;
use smartstock_infra::forecast::ForecastService;
use smartstock_infra::notify::NotificationDispatcher;
use smartstock_infra::projections::ChartAggregator;
use smartstock_infra::seed;
use smartstock_infra::store::{InMemoryRecordStore, PostgresRecordStore, RecordStore};
use smartstock_infra::ForecastRefreshRunner;

/// The store every service shares.
pub type SharedStore = Arc<dyn RecordStore>;

/// Long-lived service objects, built once at startup.
pub struct App {
    config: AppConfig,
    store: SharedStore,
    forecasts: Arc<ForecastService<dyn RecordStore>>,
    alerts: Arc<AlertEvaluator<dyn RecordStore>>,
    charts: ChartAggregator<dyn RecordStore>,
}

/// Build the store (Postgres when `DATABASE_URL` is set, in-memory otherwise) and
/// the services on top of it.
pub async fn build_app(config: AppConfig) -> anyhow::Result<App> {
    let store: SharedStore = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresRecordStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("failed to apply schema")?;
            tracing::info!(backend = "postgres", "record store ready");
            Arc::new(store)
        }
        None => {
            let store = InMemoryRecordStore::new();
            if config.seed_demo_data {
                seed::seed_demo_data(&store, Utc::now())
                    .await
                    .context("failed to seed demo data")?;
            }
            tracing::warn!(backend = "in-memory", "DATABASE_URL not set; records are not persisted");
            Arc::new(store)
        }
    };

    if config.seed_demo_data && config.database_url.is_some() {
        tracing::warn!("SEED_DEMO_DATA ignored for postgres-backed stores");
    }

    let dispatcher = Arc::new(NotificationDispatcher::from_config(&config.notify));
    let forecasts = Arc::new(ForecastService::new(store.clone()));
    let alerts = Arc::new(AlertEvaluator::new(store.clone(), dispatcher));
    let charts = ChartAggregator::new(store.clone());

    Ok(App {
        config,
        store,
        forecasts,
        alerts,
        charts,
    })
}

impl App {
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn forecasts(&self) -> &Arc<ForecastService<dyn RecordStore>> {
        &self.forecasts
    }

    pub fn alerts(&self) -> &Arc<AlertEvaluator<dyn RecordStore>> {
        &self.alerts
    }

    pub fn charts(&self) -> &ChartAggregator<dyn RecordStore> {
        &self.charts
    }

    /// Run the refresh loop until `shutdown` resolves, then stop it gracefully.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let runner = ForecastRefreshRunner::from_config(&self.config);
        let handle = runner.spawn(self.forecasts.clone(), self.alerts.clone());
        tracing::info!(
            horizon_days = runner.horizon_days,
            interval_secs = runner.interval.as_secs(),
            "smartstock running"
        );

        shutdown.await;

        tracing::info!("shutdown requested");
        handle.shutdown().await;
        tracing::info!("smartstock stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstock_infra::store::{CatalogStore, ForecastStore};
    use std::time::Duration;

    fn in_memory_config(seed: bool) -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "SEED_DEMO_DATA" if seed => Some("true".to_string()),
            "FORECAST_HORIZON_DAYS" => Some("30".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn seeded_in_memory_app_serves_every_operation() {
        let app = build_app(in_memory_config(true)).await.unwrap();

        assert_eq!(app.store().list_products().await.unwrap().len(), 15);

        let horizon = app.forecasts().generate_forecast("PROD-001", 30).await.unwrap();
        assert_eq!(horizon.len(), 30);
        let product_id = horizon[0].product_id;
        app.forecasts().persist_forecast(product_id, horizon).await.unwrap();
        assert_eq!(app.forecasts().forecast_for("PROD-001", 7).await.unwrap().len(), 7);

        // The demo catalog has critical and low-stock products.
        app.alerts().evaluate_catalog().await.unwrap();
        assert!(!app.alerts().active_alerts(50).await.unwrap().is_empty());

        let chart = app.charts().chart_series().await.unwrap();
        assert_eq!(chart.len(), 10);
        assert!(chart.iter().any(|e| e.sales.is_some()));
    }

    #[tokio::test]
    async fn unseeded_app_starts_empty() {
        let app = build_app(in_memory_config(false)).await.unwrap();
        assert!(app.store().list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_until_returns_after_shutdown() {
        let app = build_app(in_memory_config(true)).await.unwrap();
        let store = app.store().clone();

        tokio::time::timeout(
            Duration::from_secs(10),
            app.run_until(tokio::time::sleep(Duration::from_millis(200))),
        )
        .await
        .expect("app did not stop");

        // The startup cycle ran before shutdown was requested.
        let mouse = store.product_by_sku("PROD-001").await.unwrap().unwrap();
        assert_eq!(store.horizon(mouse.id).await.unwrap().len(), 30);
    }
}

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use smartstock_core::AlertId;
use smartstock_inventory::Product;

use super::model::{Alert, AlertDraft, AlertKind};
use super::rules;
use crate::error::ServiceResult;
use crate::notify::{Notification, NotificationDispatcher};
use crate::store::{AlertStore, CatalogStore, ForecastStore, RecordStore, StoreError};

/// Default page size for [`AlertEvaluator::active_alerts`].
pub const DEFAULT_ACTIVE_ALERTS_LIMIT: usize = 50;

/// Applies the alert rules, persists new alerts and notifies about them.
pub struct AlertEvaluator<S: ?Sized> {
    store: Arc<S>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl<S> AlertEvaluator<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Run both rules for one product.
    ///
    /// Returns the alerts created by this call. A rule is skipped while an unresolved
    /// alert of its kind exists for the product, so repeated calls under a persisting
    /// condition create nothing new.
    ///
    /// Every read happens before the first alert is raised: a failed lookup returns
    /// an error with nothing persisted or sent. A failed write of the second alert
    /// still returns an error; the first one stays persisted and notified and shows
    /// up in [`Self::active_alerts`].
    pub async fn evaluate_product(&self, product: &Product) -> ServiceResult<Vec<Alert>> {
        let low_stock = if self.has_open(product, AlertKind::LowStock).await? {
            None
        } else {
            rules::low_stock(product)
        };

        let surge = if self.has_open(product, AlertKind::DemandSurge).await? {
            None
        } else {
            let horizon = self.store.horizon(product.id).await?;
            rules::demand_surge(product, &horizon)
        };

        let mut created = Vec::new();
        for draft in low_stock.into_iter().chain(surge) {
            created.extend(self.raise(product, draft).await?);
        }
        Ok(created)
    }

    /// [`Self::evaluate_product`] over the whole catalog.
    ///
    /// A product that fails is logged and skipped; the others are still evaluated.
    /// Only a failure to list the catalog is returned as an error.
    pub async fn evaluate_catalog(&self) -> ServiceResult<Vec<Alert>> {
        let products = self.store.list_products().await?;
        let mut created = Vec::new();
        let mut failed = 0usize;

        for product in &products {
            match self.evaluate_product(product).await {
                Ok(alerts) => created.extend(alerts),
                Err(e) => {
                    failed += 1;
                    error!(sku = %product.sku, product = %product.id, error = %e, "alert evaluation failed");
                }
            }
        }

        info!(
            products = products.len(),
            created = created.len(),
            failed,
            "alert evaluation complete"
        );
        Ok(created)
    }

    /// `false` when the id is unknown or the alert is already resolved.
    pub async fn resolve_alert(&self, id: AlertId) -> ServiceResult<bool> {
        let resolved = self.store.resolve_alert(id).await?;
        if resolved {
            info!(alert = %id, "alert resolved");
        }
        Ok(resolved)
    }

    /// Unresolved alerts, newest first.
    pub async fn active_alerts(&self, limit: usize) -> ServiceResult<Vec<Alert>> {
        Ok(self.store.active_alerts(limit).await?)
    }

    async fn has_open(&self, product: &Product, kind: AlertKind) -> ServiceResult<bool> {
        Ok(self.store.find_unresolved(product.id, kind).await?.is_some())
    }

    /// Persist, then notify. A uniqueness rejection from the store means a concurrent
    /// evaluation won the race; nothing is created or sent.
    async fn raise(&self, product: &Product, draft: AlertDraft) -> ServiceResult<Option<Alert>> {
        let alert = Alert::open(product, draft, Utc::now());
        match self.store.insert_alert(&alert).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                debug!(sku = %product.sku, kind = %alert.kind, "unresolved alert already exists");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            alert = %alert.id,
            sku = %product.sku,
            kind = %alert.kind,
            severity = %alert.severity,
            message = %alert.message,
            "alert raised"
        );
        self.dispatcher.notify(Notification::for_alert(&alert)).await;
        Ok(Some(alert))
    }
}

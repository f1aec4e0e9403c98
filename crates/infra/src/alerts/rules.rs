//! Stateless alert rules. Deduplication against persisted alerts happens in the
//! evaluator; these functions only decide whether a condition holds right now.

use smartstock_ai::ForecastPoint;
use smartstock_inventory::{Product, StockStatus};

use super::model::{AlertDraft, AlertKind, Severity};

/// Number of leading horizon points summed by the demand-surge rule.
pub const SURGE_WINDOW_DAYS: usize = 7;

/// Demand surges when the window's predicted demand exceeds this share of stock.
pub const SURGE_STOCK_RATIO: f64 = 0.8;

/// `current_stock < threshold`; critical below half the threshold.
pub fn low_stock(product: &Product) -> Option<AlertDraft> {
    let (severity, message) = match product.status() {
        StockStatus::InStock => return None,
        StockStatus::Critical => (
            Severity::Critical,
            format!("Stock level critical: {} units remaining", product.current_stock),
        ),
        StockStatus::LowStock => (
            Severity::Warning,
            format!("Stock level below threshold: {} units remaining", product.current_stock),
        ),
    };

    Some(AlertDraft {
        kind: AlertKind::LowStock,
        severity,
        message,
    })
}

/// Predicted demand over the first [`SURGE_WINDOW_DAYS`] points of `horizon` exceeds
/// [`SURGE_STOCK_RATIO`] × current stock.
///
/// `horizon` must be ordered by date. Skipped when the product is out of stock (the
/// overage ratio is undefined) or has no forecast.
pub fn demand_surge(product: &Product, horizon: &[ForecastPoint]) -> Option<AlertDraft> {
    if horizon.is_empty() || product.current_stock <= 0 {
        return None;
    }

    let window = &horizon[..horizon.len().min(SURGE_WINDOW_DAYS)];
    let predicted: f64 = window.iter().map(|p| p.predicted_quantity).sum();
    let stock = product.current_stock as f64;

    if predicted <= SURGE_STOCK_RATIO * stock {
        return None;
    }

    let overage = (((predicted - stock) / stock) * 100.0).round() as i64;
    Some(AlertDraft {
        kind: AlertKind::DemandSurge,
        severity: Severity::Info,
        message: format!(
            "Predicted demand surge in next {} days: {overage:+}% ({predicted:.0} units predicted, {} in stock)",
            window.len(),
            product.current_stock
        ),
    })
}

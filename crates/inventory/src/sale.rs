use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smartstock_core::{ProductId, SaleId};

/// A recorded sale. Immutable once created.
///
/// Produced by [`crate::Product::sell`]; `amount` is `quantity × unit price` at the
/// time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: SaleId,
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
    pub amount: f64,
    pub sold_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smartstock_core::{DomainError, DomainResult, ProductId, SaleId};

use crate::sale::SalesRecord;

/// Stock classification of a product relative to its reorder threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    Critical,
}

impl StockStatus {
    /// `critical` below half the threshold, `low_stock` below the threshold.
    pub fn classify(current_stock: i64, threshold: i64) -> Self {
        let stock = current_stock as f64;
        let threshold = threshold as f64;
        if stock < threshold * 0.5 {
            StockStatus::Critical
        } else if stock < threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::Critical => "critical",
        }
    }
}

/// Catalog entry: what the forecast and alert engines know about a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub current_stock: i64,
    pub threshold: i64,
    /// Unit price in the catalog currency.
    pub price: f64,
    pub last_updated: DateTime<Utc>,
}

impl Product {
    /// Build a validated catalog entry with a fresh identifier.
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        current_stock: i64,
        threshold: i64,
        price: f64,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let product = Self {
            id: ProductId::new(),
            sku: sku.into(),
            name: name.into(),
            category: category.into(),
            current_stock,
            threshold,
            price,
            last_updated: at,
        };
        product.validate()?;
        Ok(product)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.current_stock < 0 {
            return Err(DomainError::validation("current_stock cannot be negative"));
        }
        if self.threshold < 0 {
            return Err(DomainError::validation("threshold cannot be negative"));
        }
        if !(self.price.is_finite() && self.price >= 0.0) {
            return Err(DomainError::validation("price must be a finite, non-negative number"));
        }
        Ok(())
    }

    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.current_stock, self.threshold)
    }

    /// Reduce stock by `quantity` and return the resulting sale.
    pub fn sell(&mut self, quantity: u32, at: DateTime<Utc>) -> DomainResult<SalesRecord> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let quantity_i64 = i64::from(quantity);
        if self.current_stock < quantity_i64 {
            return Err(DomainError::validation(format!(
                "insufficient stock for {}: {} available, {} requested",
                self.sku, self.current_stock, quantity
            )));
        }

        self.current_stock -= quantity_i64;
        self.last_updated = at;

        Ok(SalesRecord {
            id: SaleId::new(),
            product_id: self.id,
            sku: self.sku.clone(),
            quantity,
            amount: f64::from(quantity) * self.price,
            sold_at: at,
        })
    }

    /// Add incoming stock.
    pub fn restock(&mut self, quantity: u32, at: DateTime<Utc>) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.current_stock += i64::from(quantity);
        self.last_updated = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mouse() -> Product {
        Product::new("PROD-001", "Wireless Mouse", "Electronics", 45, 20, 29.99, Utc::now()).unwrap()
    }

    #[test]
    fn classifies_against_threshold() {
        assert_eq!(StockStatus::classify(5, 20), StockStatus::Critical);
        assert_eq!(StockStatus::classify(15, 20), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(25, 20), StockStatus::InStock);
        assert_eq!(StockStatus::classify(10, 20), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(20, 20), StockStatus::InStock);
    }

    #[test]
    fn sell_reduces_stock_and_prices_the_sale() {
        let mut product = mouse();
        let sale = product.sell(3, Utc::now()).unwrap();

        assert_eq!(product.current_stock, 42);
        assert_eq!(sale.product_id, product.id);
        assert_eq!(sale.sku, "PROD-001");
        assert_eq!(sale.quantity, 3);
        assert!((sale.amount - 89.97).abs() < 1e-9);
    }

    #[test]
    fn sell_rejects_insufficient_stock() {
        let mut product = mouse();
        let err = product.sell(46, Utc::now()).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("insufficient stock")),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(product.current_stock, 45);
    }

    #[test]
    fn sell_rejects_zero_quantity() {
        let mut product = mouse();
        assert!(matches!(product.sell(0, Utc::now()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn new_rejects_blank_sku_and_negative_stock() {
        assert!(Product::new("  ", "Mouse", "x", 1, 1, 1.0, Utc::now()).is_err());
        assert!(Product::new("SKU", "Mouse", "x", -1, 1, 1.0, Utc::now()).is_err());
        assert!(Product::new("SKU", "Mouse", "x", 1, 1, f64::NAN, Utc::now()).is_err());
    }

    #[test]
    fn restock_adds_units() {
        let mut product = mouse();
        product.restock(5, Utc::now()).unwrap();
        assert_eq!(product.current_stock, 50);
    }

    proptest! {
        /// Property: a successful sale never drives stock negative, and a rejected
        /// sale leaves stock untouched.
        #[test]
        fn stock_never_goes_negative(stock in 0i64..500, qty in 1u32..600) {
            let mut product = Product::new("SKU-P", "Prop", "x", stock, 10, 2.5, Utc::now()).unwrap();
            match product.sell(qty, Utc::now()) {
                Ok(sale) => {
                    prop_assert!(product.current_stock >= 0);
                    prop_assert_eq!(product.current_stock, stock - i64::from(qty));
                    prop_assert!((sale.amount - f64::from(qty) * 2.5).abs() < 1e-9);
                }
                Err(_) => prop_assert_eq!(product.current_stock, stock),
            }
        }
    }
}

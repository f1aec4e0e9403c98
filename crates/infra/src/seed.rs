//! Demo catalog with synthetic sales history, for local runs without a database.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use smartstock_core::{DomainResult, SaleId};
use smartstock_inventory::{Product, SalesRecord};

use crate::error::ServiceResult;
use crate::store::{CatalogStore, RecordStore, SalesStore};

/// Days of sales history generated per product.
pub const DEMO_HISTORY_DAYS: i64 = 90;

/// Probability that a product sells at all on a given day.
const DAILY_SALE_CHANCE: f64 = 0.8;

const DEMO_RNG_SEED: u64 = 0x5EED_0015;

struct DemoProduct {
    sku: &'static str,
    name: &'static str,
    category: &'static str,
    stock: i64,
    threshold: i64,
    price: f64,
}

const fn demo(
    sku: &'static str,
    name: &'static str,
    category: &'static str,
    stock: i64,
    threshold: i64,
    price: f64,
) -> DemoProduct {
    DemoProduct {
        sku,
        name,
        category,
        stock,
        threshold,
        price,
    }
}

const DEMO_CATALOG: [DemoProduct; 15] = [
    demo("PROD-001", "Wireless Mouse", "Electronics", 45, 20, 29.99),
    demo("PROD-002", "USB-C Cable", "Accessories", 12, 15, 12.99),
    demo("PROD-003", "Mechanical Keyboard", "Electronics", 67, 25, 89.99),
    demo("PROD-004", "Laptop Stand", "Accessories", 5, 10, 39.99),
    demo("PROD-005", "Webcam HD", "Electronics", 89, 30, 59.99),
    demo("PROD-006", "Monitor 24 inch", "Electronics", 15, 18, 199.99),
    demo("PROD-007", "Office Chair", "Furniture", 23, 15, 249.99),
    demo("PROD-008", "Desk Lamp", "Lighting", 34, 20, 45.99),
    demo("PROD-009", "Headphones", "Electronics", 8, 12, 79.99),
    demo("PROD-010", "Phone Stand", "Accessories", 56, 25, 19.99),
    demo("PROD-011", "External SSD 1TB", "Storage", 42, 20, 129.99),
    demo("PROD-012", "Bluetooth Speaker", "Electronics", 19, 15, 69.99),
    demo("PROD-013", "USB Hub", "Accessories", 71, 30, 34.99),
    demo("PROD-014", "Webcam Cover", "Accessories", 3, 8, 7.99),
    demo("PROD-015", "Cable Organizer", "Accessories", 88, 40, 14.99),
];

/// What [`seed_demo_data`] inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub sales: usize,
}

/// The fifteen demo products, stamped with `now`.
pub fn demo_catalog(now: DateTime<Utc>) -> DomainResult<Vec<Product>> {
    DEMO_CATALOG
        .iter()
        .map(|d| Product::new(d.sku, d.name, d.category, d.stock, d.threshold, d.price, now))
        .collect()
}

/// Synthetic history for `product` over the [`DEMO_HISTORY_DAYS`] days before `now`.
///
/// Each product gets a base daily volume; days vary randomly around it with a slow
/// sinusoidal trend, and roughly one day in five has no sale. Historical sales do
/// not touch `current_stock`.
pub fn demo_sales<R: Rng>(product: &Product, now: DateTime<Utc>, rng: &mut R) -> Vec<SalesRecord> {
    let base_daily: f64 = f64::from(rng.gen_range(2u32..=15));
    let mut sales = Vec::new();

    for days_ago in (1..=DEMO_HISTORY_DAYS).rev() {
        let variation: f64 = rng.gen_range(0.5..1.5);
        let seasonality = 1.0 + 0.3 * (days_ago as f64 / 10.0).sin();
        let quantity = ((base_daily * variation * seasonality) as u32).max(1);

        if rng.r#gen::<f64>() < DAILY_SALE_CHANCE {
            sales.push(SalesRecord {
                id: SaleId::new(),
                product_id: product.id,
                sku: product.sku.clone(),
                quantity,
                amount: f64::from(quantity) * product.price,
                sold_at: now - Duration::days(days_ago),
            });
        }
    }
    sales
}

/// Load the demo catalog and its history into an empty store.
///
/// A store that already holds products is left untouched. The history is
/// reproducible for a given `now`.
pub async fn seed_demo_data<S>(store: &S, now: DateTime<Utc>) -> ServiceResult<SeedSummary>
where
    S: RecordStore + ?Sized,
{
    let existing = store.list_products().await?;
    if !existing.is_empty() {
        info!(products = existing.len(), "store already populated; skipping demo seed");
        return Ok(SeedSummary::default());
    }

    let mut rng = StdRng::seed_from_u64(DEMO_RNG_SEED);
    let mut summary = SeedSummary::default();

    for product in demo_catalog(now)? {
        store.upsert_product(&product).await?;
        summary.products += 1;

        for sale in demo_sales(&product, now, &mut rng) {
            store.insert_sale(&sale).await?;
            summary.sales += 1;
        }
    }

    info!(products = summary.products, sales = summary.sales, days = DEMO_HISTORY_DAYS, "demo data seeded");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use chrono::TimeZone;
    use smartstock_inventory::StockStatus;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    #[test]
    fn catalog_covers_every_stock_status() {
        let catalog = demo_catalog(now()).unwrap();
        assert_eq!(catalog.len(), 15);
        assert_eq!(catalog[0].sku, "PROD-001");
        assert_eq!(catalog[14].sku, "PROD-015");

        let statuses: Vec<_> = catalog.iter().map(Product::status).collect();
        assert!(statuses.contains(&StockStatus::InStock));
        assert!(statuses.contains(&StockStatus::LowStock));
        assert!(statuses.contains(&StockStatus::Critical));
    }

    #[test]
    fn history_stays_in_window_with_positive_quantities() {
        let product = demo_catalog(now()).unwrap().remove(0);
        let mut rng = StdRng::seed_from_u64(7);
        let sales = demo_sales(&product, now(), &mut rng);

        assert!(!sales.is_empty());
        assert!(sales.len() <= DEMO_HISTORY_DAYS as usize);
        for s in &sales {
            assert!(s.quantity >= 1);
            assert!(s.sold_at < now());
            assert!(s.sold_at >= now() - Duration::days(DEMO_HISTORY_DAYS));
            assert!((s.amount - f64::from(s.quantity) * product.price).abs() < 1e-9);
        }
        for pair in sales.windows(2) {
            assert!(pair[0].sold_at < pair[1].sold_at);
        }
    }

    #[test]
    fn same_seed_same_quantities() {
        let product = demo_catalog(now()).unwrap().remove(3);
        let a = demo_sales(&product, now(), &mut StdRng::seed_from_u64(42));
        let b = demo_sales(&product, now(), &mut StdRng::seed_from_u64(42));

        let qty = |v: &[SalesRecord]| v.iter().map(|s| (s.sold_at, s.quantity)).collect::<Vec<_>>();
        assert_eq!(qty(&a), qty(&b));
    }

    #[tokio::test]
    async fn seeds_an_empty_store_once() {
        let store = InMemoryRecordStore::new();

        let first = seed_demo_data(&store, now()).await.unwrap();
        assert_eq!(first.products, 15);
        assert!(first.sales > 15 * 40);

        let mouse = store.product_by_sku("PROD-001").await.unwrap().unwrap();
        assert_eq!(mouse.current_stock, 45);
        assert!(!store.sales_for_product(mouse.id).await.unwrap().is_empty());

        let second = seed_demo_data(&store, now()).await.unwrap();
        assert_eq!(second, SeedSummary::default());
        assert_eq!(store.list_products().await.unwrap().len(), 15);
    }
}

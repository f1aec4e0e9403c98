//! Inventory catalog module.
//!
//! Products, stock classification and the stock-reducing sale operation,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod sale;

pub use product::{Product, StockStatus};
pub use sale::SalesRecord;

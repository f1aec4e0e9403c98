//! `smartstock-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod month;

pub use error::{DomainError, DomainResult};
pub use id::{AlertId, ForecastRunId, ProductId, SaleId};
pub use month::YearMonth;

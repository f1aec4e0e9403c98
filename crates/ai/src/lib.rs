//! `smartstock-ai`
//!
//! **Responsibility:** demand forecasting.
//!
//! This crate is deliberately kept apart from the catalog:
//! - It does not depend on inventory types; callers map sales into [`SaleObservation`]s.
//! - It performs no IO and holds no state between calls.
//! - It returns forecast points; persisting them is the caller's concern.

pub mod arima;
pub mod baseline;
pub mod engine;
pub mod model;
pub mod result;
pub mod series;

pub use arima::{Arima111, ArimaModel, DEFAULT_CONFIDENCE_Z};
pub use baseline::{BaselineModel, DEFAULT_BASELINE_QUANTITY};
pub use engine::{ForecastEngine, ForecastPolicy, ForecastSubject, MIN_AUTOREGRESSIVE_DAYS, MIN_HISTORY_RECORDS};
pub use model::{ForecastModel, ModelInput, Prediction};
pub use result::{ForecastError, ForecastOutcome, ForecastPoint, ModelKind};
pub use series::{DailySeries, SaleObservation};

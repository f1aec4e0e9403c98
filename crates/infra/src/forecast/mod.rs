//! Forecast generation and persistence.

mod locks;
mod service;

pub use service::{ForecastService, RefreshSummary};

/// Largest horizon a caller may request.
pub const MAX_HORIZON_DAYS: usize = 366;

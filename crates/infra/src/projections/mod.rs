//! Reporting read models built from stored sales and forecasts.
//!
//! Projections here are derived on demand and never written back.

pub mod chart;

pub use chart::{build_chart, ChartAggregator, ChartEntry, FORWARD_MONTHS, TRAILING_MONTHS};

//! Scheduled forecasting work.
//!
//! The runner owns no state of its own: each cycle goes through the forecast and
//! alert services. Failures are isolated and never stop the loop.

pub mod forecast_runner;

pub use forecast_runner::{ForecastRefreshRunner, ForecastRefreshRunnerHandle};

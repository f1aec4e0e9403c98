use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smartstock_core::{ForecastRunId, ProductId};

/// One day of a product's forecast horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub run_id: ForecastRunId,
    pub product_id: ProductId,
    pub sku: String,
    pub date: NaiveDate,
    pub predicted_quantity: f64,
    /// `predicted_quantity × unit price` at generation time.
    pub predicted_amount: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    pub created_at: DateTime<Utc>,
}

/// Which strategy produced a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Autoregressive,
    Baseline,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Autoregressive => "arima(1,1,1)",
            ModelKind::Baseline => "baseline",
        }
    }
}

/// Reasons a model could not be used.
///
/// These never escape [`crate::ForecastEngine::generate`]: the engine degrades to the
/// baseline model and records the reason in the outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient sales history: {actual} records, {required} required")]
    InsufficientRecords { required: usize, actual: usize },

    #[error("daily series too short: {actual} days, {required} required")]
    ShortSeries { required: usize, actual: usize },

    #[error("model fit failed: {0}")]
    ModelFit(String),
}

impl ForecastError {
    pub fn model_fit(msg: impl Into<String>) -> Self {
        Self::ModelFit(msg.into())
    }

    /// Whether this is an actual model failure (worth a warning) rather than an
    /// expected lack of data.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, ForecastError::ModelFit(_))
    }
}

/// Result of one forecast generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutcome {
    pub run_id: ForecastRunId,
    pub model: ModelKind,
    pub points: Vec<ForecastPoint>,
    /// Why the autoregressive model was not used, when it was not.
    pub fallback_reason: Option<ForecastError>,
}

impl ForecastOutcome {
    pub fn into_points(self) -> Vec<ForecastPoint> {
        self.points
    }
}

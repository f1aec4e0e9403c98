use chrono::NaiveDate;

use crate::result::{ForecastError, ModelKind};
use crate::series::{DailySeries, SaleObservation};

/// A raw model prediction for one future day, in quantity units.
///
/// Values are not clamped; the engine enforces non-negativity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Everything a model may look at for one product.
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a> {
    pub observations: &'a [SaleObservation],
    pub series: &'a DailySeries,
    /// The current UTC date; horizons that are not anchored to history start the
    /// day after.
    pub today: NaiveDate,
}

/// A forecasting strategy.
///
/// Models are pure: they must not perform IO and must return either a prediction
/// for every requested day or an error, never a partial horizon.
pub trait ForecastModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn predict(&self, input: &ModelInput<'_>, horizon_days: usize) -> Result<Vec<Prediction>, ForecastError>;
}

use chrono::{Datelike, Days, NaiveDate};

use crate::model::{ForecastModel, ModelInput, Prediction};
use crate::result::{ForecastError, ModelKind};
use crate::series::SaleObservation;

/// Assumed quantity per day when a product has no sales history at all.
pub const DEFAULT_BASELINE_QUANTITY: f64 = 10.0;

/// Fallback interval: `[0.7, 1.3] × predicted`.
pub const FALLBACK_LOWER_RATIO: f64 = 0.7;
pub const FALLBACK_UPPER_RATIO: f64 = 1.3;

/// Day-of-week demand multipliers, Monday first. All lie within `[0.8, 1.3]`.
const WEEKDAY_FACTORS: [f64; 7] = [0.95, 0.90, 1.00, 1.05, 1.15, 1.25, 0.85];

/// Baseline model: average quantity per transaction, shaped by a fixed weekly
/// pattern. Deterministic and infallible; used whenever the autoregressive model
/// is not applicable or fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineModel;

impl BaselineModel {
    /// Average quantity per observed transaction, or [`DEFAULT_BASELINE_QUANTITY`].
    pub fn baseline(observations: &[SaleObservation]) -> f64 {
        if observations.is_empty() {
            return DEFAULT_BASELINE_QUANTITY;
        }
        let total: u64 = observations.iter().map(|o| u64::from(o.quantity)).sum();
        total as f64 / observations.len() as f64
    }

    pub fn factor_for(date: NaiveDate) -> f64 {
        WEEKDAY_FACTORS[date.weekday().num_days_from_monday() as usize]
    }

    /// Predictions for `horizon_days` days starting the day after `today`.
    pub fn forecast(&self, observations: &[SaleObservation], today: NaiveDate, horizon_days: usize) -> Vec<Prediction> {
        let baseline = Self::baseline(observations);
        (1..=horizon_days as u64)
            .filter_map(|offset| today.checked_add_days(Days::new(offset)))
            .map(|date| {
                let value = baseline * Self::factor_for(date);
                Prediction {
                    date,
                    value,
                    lower: value * FALLBACK_LOWER_RATIO,
                    upper: value * FALLBACK_UPPER_RATIO,
                }
            })
            .collect()
    }
}

impl ForecastModel for BaselineModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Baseline
    }

    fn predict(&self, input: &ModelInput<'_>, horizon_days: usize) -> Result<Vec<Prediction>, ForecastError> {
        Ok(self.forecast(input.observations, input.today, horizon_days))
    }
}

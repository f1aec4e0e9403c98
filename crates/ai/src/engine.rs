use chrono::{DateTime, Utc};

use smartstock_core::{ForecastRunId, ProductId};

use crate::arima::ArimaModel;
use crate::baseline::BaselineModel;
use crate::model::{ForecastModel, ModelInput, Prediction};
use crate::result::{ForecastError, ForecastOutcome, ForecastPoint, ModelKind};
use crate::series::{DailySeries, SaleObservation};

/// Below this many sales records the autoregressive model is never attempted.
pub const MIN_HISTORY_RECORDS: usize = 10;

/// The dense daily series must span at least this many days for the
/// autoregressive model.
pub const MIN_AUTOREGRESSIVE_DAYS: usize = 30;

/// Model-selection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastPolicy {
    pub min_history_records: usize,
    pub min_autoregressive_days: usize,
}

impl Default for ForecastPolicy {
    fn default() -> Self {
        Self {
            min_history_records: MIN_HISTORY_RECORDS,
            min_autoregressive_days: MIN_AUTOREGRESSIVE_DAYS,
        }
    }
}

impl ForecastPolicy {
    /// Decide whether the autoregressive model may be attempted.
    ///
    /// Returns the reason when it may not.
    pub fn check(&self, records: usize, series_days: usize) -> Result<(), ForecastError> {
        if records < self.min_history_records {
            return Err(ForecastError::InsufficientRecords {
                required: self.min_history_records,
                actual: records,
            });
        }
        if series_days < self.min_autoregressive_days {
            return Err(ForecastError::ShortSeries {
                required: self.min_autoregressive_days,
                actual: series_days,
            });
        }
        Ok(())
    }
}

/// What the engine needs to know about the product being forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSubject {
    pub product_id: ProductId,
    pub sku: String,
    pub unit_price: f64,
}

/// Forecast engine: model selection with fallback.
///
/// Pure and synchronous; storage access is the caller's concern.
pub struct ForecastEngine {
    policy: ForecastPolicy,
    autoregressive: Box<dyn ForecastModel>,
    fallback: BaselineModel,
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self {
            policy: ForecastPolicy::default(),
            autoregressive: Box::new(ArimaModel::new()),
            fallback: BaselineModel,
        }
    }

    pub fn with_policy(mut self, policy: ForecastPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the autoregressive strategy (e.g. a different confidence level).
    pub fn with_autoregressive_model(mut self, model: impl ForecastModel + 'static) -> Self {
        self.autoregressive = Box::new(model);
        self
    }

    pub fn policy(&self) -> ForecastPolicy {
        self.policy
    }

    /// Produce a `horizon_days` forecast for one product.
    ///
    /// Never fails: when the autoregressive model is not applicable, fails to fit,
    /// or produces non-finite values, the whole horizon comes from the baseline
    /// model and the reason is recorded in `fallback_reason`.
    pub fn generate(
        &self,
        subject: &ForecastSubject,
        history: &[SaleObservation],
        horizon_days: usize,
        now: DateTime<Utc>,
    ) -> ForecastOutcome {
        let run_id = ForecastRunId::new();
        let series = DailySeries::from_observations(history);
        let input = ModelInput {
            observations: history,
            series: &series,
            today: now.date_naive(),
        };

        let attempt = self
            .policy
            .check(history.len(), series.len())
            .and_then(|()| self.autoregressive.predict(&input, horizon_days))
            .and_then(|predictions| validate(predictions, horizon_days));

        let (model, predictions, fallback_reason) = match attempt {
            Ok(predictions) => (self.autoregressive.kind(), predictions, None),
            Err(reason) => (
                ModelKind::Baseline,
                self.fallback.forecast(history, input.today, horizon_days),
                Some(reason),
            ),
        };

        let points = predictions
            .into_iter()
            .map(|p| to_point(run_id, subject, p, now))
            .collect();

        ForecastOutcome {
            run_id,
            model,
            points,
            fallback_reason,
        }
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForecastEngine")
            .field("policy", &self.policy)
            .field("autoregressive", &self.autoregressive.kind())
            .finish()
    }
}

/// A model result is only usable whole: right length, every value finite.
fn validate(predictions: Vec<Prediction>, horizon_days: usize) -> Result<Vec<Prediction>, ForecastError> {
    if predictions.len() != horizon_days {
        return Err(ForecastError::model_fit(format!(
            "model returned {} of {horizon_days} days",
            predictions.len()
        )));
    }
    let finite = predictions
        .iter()
        .all(|p| p.value.is_finite() && p.lower.is_finite() && p.upper.is_finite());
    if !finite {
        return Err(ForecastError::model_fit("model produced non-finite values"));
    }
    Ok(predictions)
}

/// Clamp to `0 ≤ lower ≤ predicted ≤ upper`.
fn to_point(run_id: ForecastRunId, subject: &ForecastSubject, p: Prediction, now: DateTime<Utc>) -> ForecastPoint {
    let predicted = p.value.max(0.0);
    let lower = p.lower.max(0.0).min(predicted);
    let upper = p.upper.max(predicted);
    ForecastPoint {
        run_id,
        product_id: subject.product_id,
        sku: subject.sku.clone(),
        date: p.date,
        predicted_quantity: predicted,
        predicted_amount: predicted * subject.unit_price,
        confidence_lower: lower,
        confidence_upper: upper,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate, TimeZone};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn subject() -> ForecastSubject {
        ForecastSubject {
            product_id: ProductId::new(),
            sku: "PROD-001".to_string(),
            unit_price: 2.0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    /// One sale per day for `days` days ending yesterday.
    fn daily_history(days: u64, qty: impl Fn(u64) -> u32) -> Vec<SaleObservation> {
        let start = now() - chrono::Duration::days(days as i64);
        (0..days)
            .map(|i| SaleObservation::new(start + chrono::Duration::days(i as i64), qty(i)))
            .collect()
    }

    /// Autoregressive stand-in that counts invocations and returns a fixed shape.
    struct Scripted {
        calls: Arc<AtomicUsize>,
        result: Result<f64, ForecastError>,
    }

    impl ForecastModel for Scripted {
        fn kind(&self) -> ModelKind {
            ModelKind::Autoregressive
        }

        fn predict(&self, input: &ModelInput<'_>, horizon_days: usize) -> Result<Vec<Prediction>, ForecastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let value = self.result.clone()?;
            let last = input.series.last_date().unwrap();
            Ok((1..=horizon_days as u64)
                .map(|i| Prediction {
                    date: last.checked_add_days(Days::new(i)).unwrap(),
                    value,
                    lower: value - 5.0,
                    upper: value + 5.0,
                })
                .collect())
        }
    }

    fn scripted(result: Result<f64, ForecastError>) -> (ForecastEngine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ForecastEngine::new().with_autoregressive_model(Scripted {
            calls: calls.clone(),
            result,
        });
        (engine, calls)
    }

    #[test]
    fn few_records_never_reach_the_autoregressive_model() {
        let (engine, calls) = scripted(Ok(3.0));
        // 9 records spread over 60 days: long series, too few records.
        let history: Vec<_> = daily_history(60, |_| 4).into_iter().step_by(7).take(9).collect();

        let outcome = engine.generate(&subject(), &history, 14, now());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.model, ModelKind::Baseline);
        assert_eq!(
            outcome.fallback_reason,
            Some(ForecastError::InsufficientRecords { required: 10, actual: 9 })
        );
        assert_eq!(outcome.points.len(), 14);
    }

    #[test]
    fn short_series_uses_the_baseline() {
        let (engine, calls) = scripted(Ok(3.0));
        let history = daily_history(20, |_| 4);

        let outcome = engine.generate(&subject(), &history, 7, now());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.model, ModelKind::Baseline);
        assert!(matches!(outcome.fallback_reason, Some(ForecastError::ShortSeries { actual: 20, .. })));
    }

    #[test]
    fn long_history_uses_the_autoregressive_model() {
        let (engine, calls) = scripted(Ok(3.0));
        let history = daily_history(45, |i| (i % 5) as u32 + 1);

        let outcome = engine.generate(&subject(), &history, 10, now());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.model, ModelKind::Autoregressive);
        assert_eq!(outcome.fallback_reason, None);
        // Anchored to the day after the last observation (yesterday).
        assert_eq!(outcome.points[0].date, now().date_naive());
        assert!(outcome.points.iter().all(|p| p.predicted_quantity == 3.0));
        assert!(outcome.points.iter().all(|p| p.predicted_amount == 6.0));
    }

    #[test]
    fn fit_failure_falls_back_for_the_whole_horizon() {
        let (engine, calls) = scripted(Err(ForecastError::model_fit("did not converge")));
        let history = daily_history(45, |_| 6);

        let outcome = engine.generate(&subject(), &history, 30, now());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.model, ModelKind::Baseline);
        assert!(outcome.fallback_reason.as_ref().is_some_and(|r| r.is_model_failure()));
        assert_eq!(outcome.points.len(), 30);
        let tomorrow = now().date_naive().succ_opt().unwrap();
        assert_eq!(outcome.points[0].date, tomorrow);
        for p in &outcome.points {
            assert!((p.confidence_lower - 0.7 * p.predicted_quantity).abs() < 1e-9);
            assert!((p.confidence_upper - 1.3 * p.predicted_quantity).abs() < 1e-9);
        }
    }

    #[test]
    fn non_finite_predictions_fall_back() {
        let (engine, _) = scripted(Ok(f64::NAN));
        let history = daily_history(45, |_| 6);

        let outcome = engine.generate(&subject(), &history, 5, now());

        assert_eq!(outcome.model, ModelKind::Baseline);
        assert!(outcome.points.iter().all(|p| p.predicted_quantity.is_finite()));
    }

    #[test]
    fn negative_predictions_are_clamped() {
        let (engine, _) = scripted(Ok(-2.0));
        let history = daily_history(45, |_| 6);

        let outcome = engine.generate(&subject(), &history, 5, now());

        assert_eq!(outcome.model, ModelKind::Autoregressive);
        for p in &outcome.points {
            assert_eq!(p.predicted_quantity, 0.0);
            assert_eq!(p.confidence_lower, 0.0);
            assert_eq!(p.confidence_upper, 3.0);
        }
    }

    #[test]
    fn empty_history_uses_default_baseline() {
        let engine = ForecastEngine::new();
        let outcome = engine.generate(&subject(), &[], 7, now());

        assert_eq!(outcome.model, ModelKind::Baseline);
        assert_eq!(outcome.points.len(), 7);
        assert!(outcome.points.iter().all(|p| p.predicted_quantity >= 8.0 && p.predicted_quantity <= 13.0));
    }

    #[test]
    fn arima_horizon_starts_after_the_last_observed_day() {
        // Daily demand integrated from w_t = 0.5·w_{t-1} + e_t + 0.3·e_{t-1}, last
        // sale five days before `now`.
        let mut state = 42u32;
        let mut noise = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state as f64 / u32::MAX as f64) * 2.0 - 1.0
        };
        let (mut w, mut e_prev, mut level) = (0.0, 0.0, 1_000.0);
        let last_day = now() - chrono::Duration::days(5);
        let history: Vec<_> = (0..120i64)
            .rev()
            .map(|days_before| {
                let e = 20.0 * noise();
                w = 0.5 * w + e + 0.3 * e_prev;
                e_prev = e;
                level += w;
                SaleObservation::new(last_day - chrono::Duration::days(days_before), level.round().max(0.0) as u32)
            })
            .collect();

        let outcome = ForecastEngine::new().generate(&subject(), &history, 14, now());

        assert_eq!(outcome.model, ModelKind::Autoregressive);
        assert_eq!(outcome.fallback_reason, None);
        assert_eq!(outcome.points.len(), 14);
        let first = last_day.date_naive().succ_opt().unwrap();
        assert_eq!(outcome.points[0].date, first);
        assert_ne!(first, now().date_naive().succ_opt().unwrap());
        for p in &outcome.points {
            assert!(0.0 <= p.confidence_lower && p.confidence_lower <= p.predicted_quantity);
            assert!(p.predicted_quantity <= p.confidence_upper);
        }
    }

    #[test]
    fn constant_history_degrades_from_arima() {
        let engine = ForecastEngine::new();
        let history = daily_history(40, |_| 5);

        let outcome = engine.generate(&subject(), &history, 7, now());

        assert_eq!(outcome.model, ModelKind::Baseline);
        assert!(outcome.fallback_reason.as_ref().is_some_and(|r| r.is_model_failure()));
    }

    #[test]
    fn points_share_one_run_and_are_consecutive() {
        let engine = ForecastEngine::new();
        let history = daily_history(60, |i| ((i * 7) % 11) as u32 + 2);

        let outcome = engine.generate(&subject(), &history, 21, now());

        assert_eq!(outcome.points.len(), 21);
        assert!(outcome.points.iter().all(|p| p.run_id == outcome.run_id));
        for pair in outcome.points.windows(2) {
            assert_eq!(pair[1].date, pair[0].date.succ_opt().unwrap());
        }
    }

    #[test]
    fn policy_reports_the_first_failing_rule() {
        let policy = ForecastPolicy::default();
        assert!(matches!(policy.check(3, 100), Err(ForecastError::InsufficientRecords { .. })));
        assert!(matches!(policy.check(50, 29), Err(ForecastError::ShortSeries { .. })));
        assert!(policy.check(10, 30).is_ok());
    }

    proptest! {
        /// Property: every generated point satisfies 0 ≤ lower ≤ predicted ≤ upper,
        /// whichever model produced it.
        #[test]
        fn confidence_bounds_are_ordered(
            sales in proptest::collection::vec((0u64..90, 0u32..40), 0..120),
            horizon in 1usize..60,
        ) {
            let base = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
            let history: Vec<_> = sales
                .iter()
                .map(|(offset, qty)| {
                    let day = base.checked_add_days(Days::new(*offset)).unwrap();
                    SaleObservation::new(day.and_hms_opt(9, 0, 0).unwrap().and_utc(), *qty)
                })
                .collect();

            let outcome = ForecastEngine::new().generate(&subject(), &history, horizon, now());

            prop_assert_eq!(outcome.points.len(), horizon);
            for p in &outcome.points {
                prop_assert!(p.confidence_lower >= 0.0);
                prop_assert!(p.confidence_lower <= p.predicted_quantity);
                prop_assert!(p.predicted_quantity <= p.confidence_upper);
            }
        }
    }
}

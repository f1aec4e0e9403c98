//! ARIMA(1,1,1) for daily demand series.
//!
//! Model (no constant, as is conventional once the series is differenced):
//!
//! ```text
//! w_t = y_t - y_{t-1}
//! w_t = φ·w_{t-1} + e_t + θ·e_{t-1}
//! ```
//!
//! Estimation is Hannan–Rissanen: a long autoregression (Levinson–Durbin on the
//! sample autocovariances) approximates the innovations, then `(φ, θ)` come from a
//! least-squares regression of `w_t` on `(w_{t-1}, ê_{t-1})`. The MA estimate is
//! clamped into the invertible region; any numerical breakdown or a
//! non-stationary AR estimate is reported as [`ForecastError::ModelFit`].

use chrono::Days;

use crate::model::{ForecastModel, ModelInput, Prediction};
use crate::result::{ForecastError, ModelKind};

/// Two-sided 95% normal quantile.
pub const DEFAULT_CONFIDENCE_Z: f64 = 1.959_963_984_540_054;

const MIN_FIT_POINTS: usize = 12;
const MAX_LONG_AR_ORDER: usize = 10;

/// MA estimates are pulled inside the invertible region to at most this magnitude.
/// Over-differenced stationary demand puts θ at or just past -1.
pub const MAX_MA_COEFFICIENT: f64 = 0.99;

/// A fitted ARIMA(1,1,1).
#[derive(Debug, Clone, PartialEq)]
pub struct Arima111 {
    phi: f64,
    theta: f64,
    sigma2: f64,
    last_level: f64,
    last_diff: f64,
    last_residual: f64,
}

impl Arima111 {
    pub fn fit(series: &[f64]) -> Result<Self, ForecastError> {
        if series.len() < MIN_FIT_POINTS {
            return Err(ForecastError::model_fit(format!(
                "need at least {MIN_FIT_POINTS} points, got {}",
                series.len()
            )));
        }
        if series.iter().any(|x| !x.is_finite()) {
            return Err(ForecastError::model_fit("series contains non-finite values"));
        }

        let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let n = diffs.len();

        let gamma0 = diffs.iter().map(|x| x * x).sum::<f64>() / n as f64;
        if gamma0 <= f64::EPSILON {
            return Err(ForecastError::model_fit("differenced series has zero variance"));
        }

        // Stage 1: long autoregression approximates the innovations.
        let order = (n / 4).clamp(2, MAX_LONG_AR_ORDER);
        let long_ar = levinson_durbin(&autocovariances(&diffs, order))?;
        let mut innovations = vec![0.0; n];
        for t in order..n {
            let fitted: f64 = long_ar
                .iter()
                .enumerate()
                .map(|(j, a)| a * diffs[t - j - 1])
                .sum();
            innovations[t] = diffs[t] - fitted;
        }

        // Stage 2: regress w_t on (w_{t-1}, ê_{t-1}).
        let (mut s11, mut s12, mut s22, mut r1, mut r2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        let mut rows = 0usize;
        for t in (order + 1)..n {
            let (x1, x2, y) = (diffs[t - 1], innovations[t - 1], diffs[t]);
            s11 += x1 * x1;
            s12 += x1 * x2;
            s22 += x2 * x2;
            r1 += x1 * y;
            r2 += x2 * y;
            rows += 1;
        }
        if rows < 3 {
            return Err(ForecastError::model_fit("too few rows for the ARMA regression"));
        }

        let det = s11 * s22 - s12 * s12;
        if !det.is_finite() || det.abs() <= 1e-9 * (s11 * s22).max(f64::MIN_POSITIVE) {
            return Err(ForecastError::model_fit("singular ARMA regression; estimates did not converge"));
        }
        let phi = (r1 * s22 - r2 * s12) / det;
        let raw_theta = (s11 * r2 - s12 * r1) / det;

        if !phi.is_finite() || phi.abs() >= 1.0 {
            return Err(ForecastError::model_fit(format!("non-stationary AR coefficient {phi:.3}")));
        }
        if !raw_theta.is_finite() {
            return Err(ForecastError::model_fit("MA coefficient diverged"));
        }
        let theta = raw_theta.clamp(-MAX_MA_COEFFICIENT, MAX_MA_COEFFICIENT);

        // Conditional residuals under the fitted coefficients.
        let mut residual = 0.0;
        let mut sse = 0.0;
        for t in 1..n {
            residual = diffs[t] - phi * diffs[t - 1] - theta * residual;
            sse += residual * residual;
        }
        let sigma2 = sse / (n - 1).saturating_sub(2).max(1) as f64;
        if !sigma2.is_finite() {
            return Err(ForecastError::model_fit("residual variance diverged"));
        }

        Ok(Self {
            phi,
            theta,
            sigma2,
            last_level: series[series.len() - 1],
            last_diff: diffs[n - 1],
            last_residual: residual,
        })
    }

    pub fn phi(&self) -> f64 {
        self.phi
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// `(mean, half_width)` for each of the next `steps` days, where the interval is
    /// `mean ± half_width` at normal quantile `z`.
    pub fn forecast(&self, steps: usize, z: f64) -> Vec<(f64, f64)> {
        let mut out = Vec::with_capacity(steps);
        let mut level = self.last_level;
        let mut diff_hat = 0.0;
        // ψ-weights of the ARMA part (ψ_0 = 1, ψ_1 = φ + θ, ψ_j = φ·ψ_{j-1}),
        // accumulated once more for the integration.
        let mut psi = 1.0;
        let mut cum_psi = 0.0;
        let mut var_sum = 0.0;

        for h in 0..steps {
            diff_hat = if h == 0 {
                self.phi * self.last_diff + self.theta * self.last_residual
            } else {
                self.phi * diff_hat
            };
            level += diff_hat;

            psi = match h {
                0 => 1.0,
                1 => self.phi + self.theta,
                _ => self.phi * psi,
            };
            cum_psi += psi;
            var_sum += cum_psi * cum_psi;

            out.push((level, z * (self.sigma2 * var_sum).sqrt()));
        }

        out
    }
}

fn autocovariances(xs: &[f64], max_lag: usize) -> Vec<f64> {
    let n = xs.len() as f64;
    (0..=max_lag)
        .map(|k| xs.iter().skip(k).zip(xs).map(|(a, b)| a * b).sum::<f64>() / n)
        .collect()
}

/// Solve the Yule–Walker equations for AR coefficients `a_1..a_p`.
fn levinson_durbin(autocov: &[f64]) -> Result<Vec<f64>, ForecastError> {
    let p = autocov.len().saturating_sub(1);
    let mut coeffs = vec![0.0; p];
    let mut err = autocov[0];

    for k in 0..p {
        let mut acc = autocov[k + 1];
        for j in 0..k {
            acc -= coeffs[j] * autocov[k - j];
        }
        let reflection = acc / err;

        let prev = coeffs.clone();
        coeffs[k] = reflection;
        for j in 0..k {
            coeffs[j] = prev[j] - reflection * prev[k - 1 - j];
        }

        err *= 1.0 - reflection * reflection;
        if !(err.is_finite() && err > 0.0) {
            return Err(ForecastError::model_fit("long autoregression did not converge"));
        }
    }

    Ok(coeffs)
}

/// [`ForecastModel`] adapter: fits on the dense daily series and starts the horizon
/// the day after the last observed date.
#[derive(Debug, Clone, Copy)]
pub struct ArimaModel {
    confidence_z: f64,
}

impl ArimaModel {
    pub fn new() -> Self {
        Self {
            confidence_z: DEFAULT_CONFIDENCE_Z,
        }
    }

    pub fn with_confidence_z(mut self, z: f64) -> Self {
        self.confidence_z = z;
        self
    }
}

impl Default for ArimaModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastModel for ArimaModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Autoregressive
    }

    fn predict(&self, input: &ModelInput<'_>, horizon_days: usize) -> Result<Vec<Prediction>, ForecastError> {
        let last = input
            .series
            .last_date()
            .ok_or_else(|| ForecastError::model_fit("empty series"))?;
        let fitted = Arima111::fit(&input.series.values())?;

        fitted
            .forecast(horizon_days, self.confidence_z)
            .into_iter()
            .enumerate()
            .map(|(i, (mean, half_width))| {
                let date = last
                    .checked_add_days(Days::new(i as u64 + 1))
                    .ok_or_else(|| ForecastError::model_fit("forecast date out of range"))?;
                Ok(Prediction {
                    date,
                    value: mean,
                    lower: mean - half_width,
                    upper: mean + half_width,
                })
            })
            .collect()
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use smartstock_core::YearMonth;

use crate::error::ServiceResult;
use crate::store::{ForecastStore, MonthlyTotal, RecordStore, SalesStore};

/// Months before the current one shown in the chart.
pub const TRAILING_MONTHS: i32 = 7;
/// Current month plus the months after it.
pub const FORWARD_MONTHS: i32 = 3;

/// One month of the sales-vs-forecast chart. Amounts are in currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEntry {
    /// Short month name, e.g. `"Oct"`.
    pub month: &'static str,
    pub year_month: YearMonth,
    /// `None` when no sale was recorded in the month (distinct from a zero total).
    pub sales: Option<f64>,
    /// Predicted amount; falls back to `sales`, then 0.
    pub forecast: f64,
}

/// First month of the chart window anchored at `current`.
pub fn window_start(current: YearMonth) -> YearMonth {
    current.offset(-TRAILING_MONTHS)
}

/// Assemble the chart from per-month totals. Months outside the window are ignored.
pub fn build_chart(current: YearMonth, sales: &[MonthlyTotal], forecasts: &[MonthlyTotal]) -> Vec<ChartEntry> {
    let index = |totals: &[MonthlyTotal]| {
        let mut by_month: HashMap<YearMonth, f64> = HashMap::new();
        for t in totals {
            *by_month.entry(t.month).or_insert(0.0) += t.total;
        }
        by_month
    };
    let sales = index(sales);
    let forecasts = index(forecasts);

    (-TRAILING_MONTHS..FORWARD_MONTHS)
        .map(|offset| {
            let month = current.offset(offset);
            let actual = sales.get(&month).copied().map(round_cents);
            let forecast = forecasts
                .get(&month)
                .copied()
                .map(round_cents)
                .or(actual)
                .unwrap_or(0.0);
            ChartEntry {
                month: month.label(),
                year_month: month,
                sales: actual,
                forecast,
            }
        })
        .collect()
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Month-bucketed sales and forecast totals for reporting.
pub struct ChartAggregator<S: ?Sized> {
    store: Arc<S>,
}

impl<S> ChartAggregator<S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ten entries: the seven months before the current one, the current month and
    /// the two after it, in chronological order.
    pub async fn chart_series(&self) -> ServiceResult<Vec<ChartEntry>> {
        self.chart_series_at(Utc::now()).await
    }

    pub async fn chart_series_at(&self, now: DateTime<Utc>) -> ServiceResult<Vec<ChartEntry>> {
        let current = YearMonth::of(now);
        let start = window_start(current).first_day();

        let sales = self
            .store
            .sales_totals_by_month(start.and_time(NaiveTime::default()).and_utc())
            .await?;
        let forecasts = self.store.forecast_totals_by_month(start).await?;

        Ok(build_chart(current, &sales, &forecasts))
    }
}

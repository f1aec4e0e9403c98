use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One observed sale as seen by the forecasting models.
///
/// This is a model input, not the catalog's sales record: callers (infra) map their
/// stored records into observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleObservation {
    pub sold_at: DateTime<Utc>,
    pub quantity: u32,
}

impl SaleObservation {
    pub fn new(sold_at: DateTime<Utc>, quantity: u32) -> Self {
        Self { sold_at, quantity }
    }
}

/// Dense daily quantity series.
///
/// Spans the first to the last observed sale date (UTC) inclusive; days without a
/// recorded sale are present with quantity 0. An empty history yields an empty
/// series.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DailySeries {
    start: Option<NaiveDate>,
    quantities: Vec<u64>,
}

impl DailySeries {
    /// Resample unordered observations into a dense daily series.
    pub fn from_observations(observations: &[SaleObservation]) -> Self {
        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for obs in observations {
            *by_day.entry(obs.sold_at.date_naive()).or_insert(0) += u64::from(obs.quantity);
        }

        let (Some((&first, _)), Some((&last, _))) =
            (by_day.first_key_value(), by_day.last_key_value())
        else {
            return Self::default();
        };

        let span = (last - first).num_days() as usize + 1;
        let mut quantities = vec![0u64; span];
        for (day, qty) in by_day {
            quantities[(day - first).num_days() as usize] = qty;
        }

        Self {
            start: Some(first),
            quantities,
        }
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        let start = self.start?;
        start.checked_add_days(Days::new(self.quantities.len().saturating_sub(1) as u64))
    }

    /// Summed quantity for `date`, or `None` outside the observed span.
    pub fn get(&self, date: NaiveDate) -> Option<u64> {
        let start = self.start?;
        let offset = (date - start).num_days();
        if offset < 0 {
            return None;
        }
        self.quantities.get(offset as usize).copied()
    }

    /// `(date, quantity)` pairs in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        let start = self.start;
        self.quantities.iter().enumerate().filter_map(move |(i, q)| {
            start
                .and_then(|s| s.checked_add_days(Days::new(i as u64)))
                .map(|d| (d, *q))
        })
    }

    pub fn values(&self) -> Vec<f64> {
        self.quantities.iter().map(|q| *q as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_history_yields_empty_series() {
        let series = DailySeries::from_observations(&[]);
        assert!(series.is_empty());
        assert_eq!(series.first_date(), None);
        assert_eq!(series.last_date(), None);
    }

    #[test]
    fn sums_same_day_and_zero_fills_gaps() {
        let obs = vec![
            SaleObservation::new(at(2026, 3, 5, 18), 4),
            SaleObservation::new(at(2026, 3, 1, 9), 2),
            SaleObservation::new(at(2026, 3, 1, 15), 3),
            SaleObservation::new(at(2026, 3, 3, 11), 1),
        ];
        let series = DailySeries::from_observations(&obs);

        assert_eq!(series.len(), 5);
        assert_eq!(series.first_date(), Some(date(2026, 3, 1)));
        assert_eq!(series.last_date(), Some(date(2026, 3, 5)));

        let pairs: Vec<_> = series.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (date(2026, 3, 1), 5),
                (date(2026, 3, 2), 0),
                (date(2026, 3, 3), 1),
                (date(2026, 3, 4), 0),
                (date(2026, 3, 5), 4),
            ]
        );
        assert_eq!(series.get(date(2026, 2, 28)), None);
        assert_eq!(series.get(date(2026, 3, 6)), None);
    }

    #[test]
    fn spans_month_boundaries() {
        let obs = vec![
            SaleObservation::new(at(2026, 1, 30, 0), 1),
            SaleObservation::new(at(2026, 2, 2, 0), 1),
        ];
        let series = DailySeries::from_observations(&obs);
        assert_eq!(series.len(), 4);
        assert_eq!(series.values(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    proptest! {
        /// Property: the dense series preserves the total quantity and spans exactly
        /// first..=last observed day.
        #[test]
        fn dense_series_preserves_totals(days in proptest::collection::vec((0u64..120, 0u32..50), 1..60)) {
            let base = date(2026, 1, 1);
            let obs: Vec<_> = days
                .iter()
                .map(|(offset, qty)| {
                    let day = base.checked_add_days(Days::new(*offset)).unwrap();
                    SaleObservation::new(day.and_hms_opt(12, 0, 0).unwrap().and_utc(), *qty)
                })
                .collect();

            let series = DailySeries::from_observations(&obs);
            let min = days.iter().map(|(o, _)| *o).min().unwrap();
            let max = days.iter().map(|(o, _)| *o).max().unwrap();

            prop_assert_eq!(series.len() as u64, max - min + 1);
            let total: u64 = days.iter().map(|(_, q)| u64::from(*q)).sum();
            prop_assert_eq!(series.iter().map(|(_, q)| q).sum::<u64>(), total);
        }
    }
}

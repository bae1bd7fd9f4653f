//! Shares Back-Computation
//!
//! Only the latest shares outstanding is ever observed. Historical counts are
//! reconstructed by walking backward from the as-of date and dividing by the
//! ratio of every split passed on the way:
//!
//! shares(d) = S₀ / Π r_s  for all splits s with d < s.date ≤ as_of
//!
//! Dates after the as-of date get the inverse treatment (multiply by splits
//! in `(as_of, d]`). Dates before the earliest split record are assumed
//! split-free; with a one-month lookback that approximation is accepted.

use crate::error::{IndexError, Result};
use crate::model::{SharesSnapshot, SplitEvent, Ticker, TimeSeries};
use crate::quality::{DataQualityKind, DataQualityLog};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Shares outstanding of `ticker` on `date`.
///
/// `splits` must be ascending by date.
///
/// # Errors
/// Returns [`IndexError::DataIntegrity`] if the snapshot holds zero shares or
/// if a split between `date` and the as-of date has a ratio that is not a
/// positive finite number.
pub fn back_compute(
    ticker: &Ticker,
    snapshot: &SharesSnapshot,
    splits: &[SplitEvent],
    date: NaiveDate,
) -> Result<f64> {
    if snapshot.shares == 0 {
        return Err(IndexError::integrity(
            ticker,
            format!("zero shares outstanding as of {}", snapshot.as_of),
        ));
    }

    let as_of = snapshot.as_of;
    let mut shares = snapshot.shares as f64;

    if date <= as_of {
        for split in splits
            .iter()
            .rev()
            .filter(|s| s.date > date && s.date <= as_of)
        {
            shares /= checked_ratio(ticker, split)?;
        }
    } else {
        for split in splits.iter().filter(|s| s.date > as_of && s.date <= date) {
            shares *= checked_ratio(ticker, split)?;
        }
    }

    Ok(shares)
}

fn checked_ratio(ticker: &Ticker, split: &SplitEvent) -> Result<f64> {
    if split.ratio.is_finite() && split.ratio > 0.0 {
        Ok(split.ratio)
    } else {
        Err(IndexError::integrity(
            ticker,
            format!("invalid split ratio {} on {}", split.ratio, split.date),
        ))
    }
}

/// Dates of one ticker that could not get a share count.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityFailure {
    /// Ticker
    pub ticker: Ticker,
    /// First affected price date
    pub from: NaiveDate,
    /// Last affected price date
    pub to: NaiveDate,
    /// Number of affected price dates
    pub dates: usize,
    /// The first error encountered
    pub error: IndexError,
}

/// Back-computed shares keyed by `(ticker, date)`.
#[derive(Debug, Clone, Default)]
pub struct SharesTable {
    values: BTreeMap<(Ticker, NaiveDate), f64>,
    failures: Vec<IntegrityFailure>,
}

impl SharesTable {
    /// Shares of `ticker` on `date`.
    pub fn get(&self, ticker: &Ticker, date: NaiveDate) -> Option<f64> {
        self.values.get(&(ticker.clone(), date)).copied()
    }

    /// Full series of one ticker, ascending by date.
    pub fn series(&self, ticker: &Ticker) -> Vec<(NaiveDate, f64)> {
        self.values
            .range((ticker.clone(), NaiveDate::MIN)..=(ticker.clone(), NaiveDate::MAX))
            .map(|((_, date), shares)| (*date, *shares))
            .collect()
    }

    /// Tickers whose series failed validation on some dates.
    pub fn failures(&self) -> &[IntegrityFailure] {
        &self.failures
    }

    /// Number of `(ticker, date)` values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Produces share counts for every price date in the window.
#[derive(Debug, Clone)]
pub struct SharesEngine {
    window_start: NaiveDate,
}

impl SharesEngine {
    /// Create an engine for a window beginning on `window_start`.
    pub const fn new(window_start: NaiveDate) -> Self {
        Self { window_start }
    }

    /// Back-compute one ticker, failing on the first invalid date.
    ///
    /// # Errors
    /// Returns [`IndexError::DataIntegrity`] if the shares snapshot predates
    /// the window or any date cannot be back-computed.
    pub fn series_for(&self, series: &TimeSeries) -> Result<Vec<(NaiveDate, f64)>> {
        self.check_snapshot(series)?;
        series
            .prices
            .iter()
            .map(|p| {
                back_compute(&series.ticker, &series.shares, &series.splits, p.date)
                    .map(|shares| (p.date, shares))
            })
            .collect()
    }

    /// Back-compute every series.
    ///
    /// Invalid dates are left out of the table and reported once per ticker
    /// through `log`; valid dates of the same ticker are kept.
    pub fn compute(&self, series: &[TimeSeries], log: &mut DataQualityLog) -> SharesTable {
        let mut table = SharesTable::default();

        for ts in series {
            if let Err(error) = self.check_snapshot(ts) {
                if let (Some(from), Some(to)) = (ts.first_date(), ts.last_date()) {
                    log.record(
                        &ts.ticker,
                        None,
                        DataQualityKind::IntegrityFailure,
                        error.to_string(),
                    );
                    table.failures.push(IntegrityFailure {
                        ticker: ts.ticker.clone(),
                        from,
                        to,
                        dates: ts.prices.len(),
                        error,
                    });
                }
                continue;
            }

            let mut failed: Option<IntegrityFailure> = None;
            for price in &ts.prices {
                match back_compute(&ts.ticker, &ts.shares, &ts.splits, price.date) {
                    Ok(shares) => {
                        table.values.insert((ts.ticker.clone(), price.date), shares);
                    }
                    Err(error) => match failed.as_mut() {
                        Some(failure) => {
                            failure.to = price.date;
                            failure.dates += 1;
                        }
                        None => {
                            failed = Some(IntegrityFailure {
                                ticker: ts.ticker.clone(),
                                from: price.date,
                                to: price.date,
                                dates: 1,
                                error,
                            });
                        }
                    },
                }
            }

            if let Some(failure) = failed {
                log.record(
                    &failure.ticker,
                    Some(failure.from),
                    DataQualityKind::IntegrityFailure,
                    format!(
                        "{} ({} dates through {} excluded)",
                        failure.error, failure.dates, failure.to
                    ),
                );
                table.failures.push(failure);
            }
        }

        tracing::debug!(
            values = table.len(),
            failures = table.failures.len(),
            "back-computed shares"
        );

        table
    }

    fn check_snapshot(&self, series: &TimeSeries) -> Result<()> {
        if series.shares.as_of < self.window_start {
            return Err(IndexError::integrity(
                &series.ticker,
                format!(
                    "shares as of {} precede window start {}",
                    series.shares.as_of, self.window_start
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceObservation;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn series(splits: Vec<SplitEvent>, shares: u64, as_of: u32) -> TimeSeries {
        TimeSeries::new(
            Ticker::new("NVDA"),
            (3..=14)
                .map(|d| PriceObservation::new(date(d), 100.0))
                .collect(),
            splits,
            SharesSnapshot::new(date(as_of), shares),
        )
    }

    #[test]
    fn test_no_splits_keeps_current_shares() {
        let ts = series(vec![], 2_460_000_000, 14);
        let engine = SharesEngine::new(date(1));

        for (_, shares) in engine.series_for(&ts).unwrap() {
            assert_eq!(shares, 2_460_000_000.0);
        }
    }

    #[test]
    fn test_two_for_one_split() {
        let ts = series(vec![SplitEvent::new(date(10), 2.0)], 1_000, 14);
        let engine = SharesEngine::new(date(1));

        for (d, shares) in engine.series_for(&ts).unwrap() {
            if d < date(10) {
                assert_relative_eq!(shares, 500.0);
            } else {
                assert_relative_eq!(shares, 1_000.0);
            }
        }
    }

    #[test]
    fn test_splits_compound() {
        let splits = vec![SplitEvent::new(date(5), 2.0), SplitEvent::new(date(10), 3.0)];
        let ticker = Ticker::new("X");
        let snapshot = SharesSnapshot::new(date(14), 600);

        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(4)).unwrap(), 100.0);
        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(5)).unwrap(), 200.0);
        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(9)).unwrap(), 200.0);
        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(10)).unwrap(), 600.0);
    }

    #[test]
    fn test_split_after_as_of_applies_forward() {
        let splits = vec![SplitEvent::new(date(12), 4.0)];
        let ticker = Ticker::new("X");
        let snapshot = SharesSnapshot::new(date(10), 100);

        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(11)).unwrap(), 100.0);
        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(12)).unwrap(), 400.0);
    }

    #[test]
    fn test_reverse_split() {
        let splits = vec![SplitEvent::new(date(8), 0.1)];
        let ticker = Ticker::new("X");
        let snapshot = SharesSnapshot::new(date(14), 1_000);

        assert_relative_eq!(back_compute(&ticker, &snapshot, &splits, date(7)).unwrap(), 10_000.0);
    }

    #[rstest]
    #[case::zero(0.0)]
    #[case::negative(-2.0)]
    #[case::nan(f64::NAN)]
    #[case::infinite(f64::INFINITY)]
    fn test_invalid_ratio_is_integrity_error(#[case] ratio: f64) {
        let splits = vec![SplitEvent::new(date(10), ratio)];
        let result = back_compute(
            &Ticker::new("X"),
            &SharesSnapshot::new(date(14), 1_000),
            &splits,
            date(9),
        );
        assert!(matches!(result, Err(IndexError::DataIntegrity { .. })));
    }

    #[test]
    fn test_invalid_ratio_outside_walk_is_ignored() {
        let splits = vec![SplitEvent::new(date(5), 0.0)];
        let result = back_compute(
            &Ticker::new("X"),
            &SharesSnapshot::new(date(14), 1_000),
            &splits,
            date(9),
        );
        assert_eq!(result.unwrap(), 1_000.0);
    }

    #[test]
    fn test_zero_shares_is_integrity_error() {
        let result = back_compute(
            &Ticker::new("X"),
            &SharesSnapshot::new(date(14), 0),
            &[],
            date(9),
        );
        assert!(matches!(result, Err(IndexError::DataIntegrity { .. })));
    }

    #[test]
    fn test_compute_excludes_only_affected_dates() {
        let ts = series(vec![SplitEvent::new(date(10), -1.0)], 1_000, 14);
        let engine = SharesEngine::new(date(1));
        let mut log = DataQualityLog::new();

        let table = engine.compute(&[ts], &mut log);
        let ticker = Ticker::new("NVDA");

        assert_eq!(table.get(&ticker, date(9)), None);
        assert_eq!(table.get(&ticker, date(10)), Some(1_000.0));
        assert_eq!(table.series(&ticker).len(), 5);

        let failure = &table.failures()[0];
        assert_eq!(failure.from, date(3));
        assert_eq!(failure.to, date(9));
        assert_eq!(failure.dates, 7);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_snapshot_before_window_fails_whole_ticker() {
        let ts = series(vec![], 1_000, 2);
        let engine = SharesEngine::new(date(3));
        let mut log = DataQualityLog::new();

        assert!(engine.series_for(&ts).is_err());

        let table = engine.compute(&[ts], &mut log);
        assert!(table.is_empty());
        assert_eq!(table.failures().len(), 1);
        assert_eq!(log.events()[0].kind, DataQualityKind::IntegrityFailure);
    }
}

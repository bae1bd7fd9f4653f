//! End-to-end index run.
//!
//! Stages run strictly in sequence, each consuming the previous stage's
//! output: shares → market cap and ranking → index construction.

use crate::config::IndexConfig;
use crate::construction::{IndexEngine, IndexSeries};
use crate::error::{IndexError, Result};
use crate::model::{DailyMarketCap, Ticker, TimeSeries};
use crate::quality::{DataQualityEvent, DataQualityKind, DataQualityLog, counts_by_kind};
use crate::ranking::{MarketCapTable, RankingEngine};
use crate::shares::{SharesEngine, SharesTable};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Builds the index from in-memory time series.
#[derive(Debug, Clone)]
pub struct IndexPipeline {
    config: IndexConfig,
}

impl IndexPipeline {
    /// Create a pipeline. The configuration is validated by [`Self::run`].
    pub const fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    /// Configuration used by this pipeline.
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Run all stages.
    ///
    /// `series` entries whose ticker is not part of `universe` are ignored.
    /// Universe tickers without a series are recorded as
    /// [`DataQualityKind::MissingSeries`].
    ///
    /// The window ends on the latest price date across all series and
    /// starts `lookback_days` earlier.
    ///
    /// # Errors
    /// Returns [`IndexError::Configuration`] for an invalid configuration and
    /// [`IndexError::EmptyInput`] when no series holds a price.
    pub fn run(&self, universe: &[Ticker], series: &[TimeSeries]) -> Result<IndexRun> {
        let members: BTreeSet<&Ticker> = universe.iter().collect();
        self.config.validate(members.len())?;

        let mut log = DataQualityLog::new();

        let delivered: BTreeSet<&Ticker> = series.iter().map(|ts| &ts.ticker).collect();
        for ticker in members.iter().filter(|t| !delivered.contains(*t)) {
            log.record(ticker, None, DataQualityKind::MissingSeries, "no time series");
        }

        let window_end = series
            .iter()
            .filter(|ts| members.contains(&ts.ticker))
            .filter_map(TimeSeries::last_date)
            .max()
            .ok_or_else(|| IndexError::EmptyInput("no price observations".to_string()))?;
        let window_start = self.config.window_start(window_end);

        let windowed: Vec<TimeSeries> = series
            .iter()
            .filter(|ts| members.contains(&ts.ticker))
            .map(|ts| ts.within(window_start, window_end))
            .collect();

        tracing::info!(
            tickers = windowed.len(),
            start = %window_start,
            end = %window_end,
            top_k = self.config.top_k,
            "running index pipeline"
        );

        let shares = SharesEngine::new(window_start).compute(&windowed, &mut log);

        let ranking = RankingEngine::new(&self.config);
        let market_caps = ranking.market_caps(&windowed, &shares, &mut log);
        let constituencies = ranking.select(&market_caps);

        let series = IndexEngine::new(&self.config).build(&constituencies, &market_caps, &mut log)?;

        if let Some(latest) = series.latest() {
            tracing::info!(
                date = %latest.date,
                level = latest.level,
                events = log.len(),
                "index pipeline finished"
            );
        }

        Ok(IndexRun {
            config: self.config.clone(),
            window_start,
            window_end,
            shares,
            market_caps,
            series,
            events: log.into_events(),
        })
    }
}

/// Result of one pipeline run. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct IndexRun {
    /// Configuration the run used
    pub config: IndexConfig,
    /// First date of the window
    pub window_start: NaiveDate,
    /// Last date of the window
    pub window_end: NaiveDate,
    /// Back-computed shares
    pub shares: SharesTable,
    /// Ranked market caps
    pub market_caps: MarketCapTable,
    /// Index levels, constituencies and composition changes
    pub series: IndexSeries,
    /// Data-quality exclusions in the order they happened
    pub events: Vec<DataQualityEvent>,
}

impl IndexRun {
    /// Market cap row of `ticker` on `date`.
    ///
    /// # Errors
    /// Returns [`IndexError::MissingData`] if the ticker was not ranked on
    /// that date.
    pub fn market_cap(&self, ticker: &Ticker, date: NaiveDate) -> Result<&DailyMarketCap> {
        self.market_caps
            .get(ticker, date)
            .ok_or_else(|| IndexError::MissingData {
                ticker: ticker.clone(),
                date,
            })
    }

    /// Constituents on `date`, each with its market cap row.
    ///
    /// # Errors
    /// Returns [`IndexError::MissingData`] if a constituent has no row.
    pub fn constituents_with_caps(&self, date: NaiveDate) -> Result<Vec<&DailyMarketCap>> {
        self.series
            .constituency(date)
            .map(|c| {
                c.tickers
                    .iter()
                    .map(|t| self.market_cap(t, date))
                    .collect::<Result<Vec<_>>>()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Number of events of one kind.
    pub fn event_count(&self, kind: DataQualityKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Number of events of each kind that occurred.
    pub fn event_counts(&self) -> BTreeMap<DataQualityKind, usize> {
        counts_by_kind(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PriceObservation, SharesSnapshot};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn series(ticker: &str, days: std::ops::RangeInclusive<u32>, close: f64) -> TimeSeries {
        TimeSeries::new(
            Ticker::new(ticker),
            days.map(|d| PriceObservation::new(date(d), close)).collect(),
            vec![],
            SharesSnapshot::new(date(20), 1_000),
        )
    }

    fn tickers(symbols: &[&str]) -> Vec<Ticker> {
        symbols.iter().map(|s| Ticker::new(*s)).collect()
    }

    fn config(top_k: usize, lookback_days: u32) -> IndexConfig {
        IndexConfig {
            top_k,
            lookback_days,
            ..IndexConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_before_computing() {
        let result = IndexPipeline::new(config(3, 30)).run(&tickers(&["A", "B"]), &[]);
        assert!(matches!(result, Err(IndexError::Configuration(_))));
    }

    #[test]
    fn test_no_prices_is_empty_input() {
        let result = IndexPipeline::new(config(1, 30)).run(&tickers(&["A"]), &[]);
        assert!(matches!(result, Err(IndexError::EmptyInput(_))));
    }

    #[test]
    fn test_window_trims_prices() {
        let run = IndexPipeline::new(config(1, 5))
            .run(&tickers(&["A"]), &[series("A", 1..=20, 10.0)])
            .unwrap();

        assert_eq!(run.window_end, date(20));
        assert_eq!(run.window_start, date(15));
        assert_eq!(run.series.levels().len(), 6);
        assert_eq!(run.series.levels()[0].date, date(15));
    }

    #[test]
    fn test_missing_series_is_recorded() {
        let run = IndexPipeline::new(config(1, 30))
            .run(&tickers(&["A", "B"]), &[series("A", 15..=20, 10.0)])
            .unwrap();

        assert_eq!(run.event_count(DataQualityKind::MissingSeries), 1);
        assert_eq!(run.events[0].ticker, Ticker::new("B"));
        assert_eq!(
            run.event_counts().into_iter().collect::<Vec<_>>(),
            vec![(DataQualityKind::MissingSeries, 1)]
        );
    }

    #[test]
    fn test_series_outside_universe_ignored() {
        let run = IndexPipeline::new(config(1, 30))
            .run(
                &tickers(&["A"]),
                &[series("A", 15..=20, 10.0), series("Z", 15..=20, 99.0)],
            )
            .unwrap();

        assert!(run.series.all_members().iter().all(|t| t.as_str() == "A"));
        assert!(run.market_cap(&Ticker::new("Z"), date(20)).is_err());
    }

    #[test]
    fn test_constituents_with_caps() {
        let run = IndexPipeline::new(config(2, 30))
            .run(
                &tickers(&["A", "B", "C"]),
                &[
                    series("A", 15..=20, 10.0),
                    series("B", 15..=20, 30.0),
                    series("C", 15..=20, 20.0),
                ],
            )
            .unwrap();

        let rows = run.constituents_with_caps(date(20)).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, vec!["B", "C"]);
        assert_eq!(rows[0].market_cap, 30_000.0);
        assert!(run.constituents_with_caps(date(1)).unwrap().is_empty());
    }
}

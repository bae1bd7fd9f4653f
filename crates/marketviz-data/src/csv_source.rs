//! Time series loaded from CSV files.
//!
//! A data directory holds three files:
//!
//! - `prices.csv`: `ticker,date,close`
//! - `splits.csv`: `ticker,date,ratio` (optional)
//! - `shares.csv`: `ticker,as_of,shares`
//!
//! Dates are ISO 8601 (`2024-06-10`).

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use marketviz_index::{PriceObservation, SharesSnapshot, SplitEvent, Ticker, TimeSeries};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Prices file name.
pub const PRICES_FILE: &str = "prices.csv";
/// Splits file name.
pub const SPLITS_FILE: &str = "splits.csv";
/// Shares file name.
pub const SHARES_FILE: &str = "shares.csv";

#[derive(Debug, Deserialize)]
struct PriceRow {
    ticker: String,
    date: NaiveDate,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct SplitRow {
    ticker: String,
    date: NaiveDate,
    ratio: f64,
}

#[derive(Debug, Deserialize)]
struct SharesRow {
    ticker: String,
    as_of: NaiveDate,
    shares: u64,
}

fn read_rows<T, R>(reader: R) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    rdr.deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(DataError::from)
}

/// Loads time series from a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
}

impl CsvSource {
    /// Create a source reading from `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory the source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every series in the directory.
    ///
    /// # Errors
    /// Returns [`DataError::Io`] if `prices.csv` or `shares.csv` cannot be
    /// opened and [`DataError::Csv`] for malformed rows.
    pub fn load(&self) -> Result<Vec<TimeSeries>> {
        let prices = File::open(self.dir.join(PRICES_FILE))?;
        let shares = File::open(self.dir.join(SHARES_FILE))?;

        let splits_path = self.dir.join(SPLITS_FILE);
        let splits = if splits_path.exists() {
            Some(File::open(splits_path)?)
        } else {
            None
        };

        let series = Self::from_readers(prices, splits, shares)?;
        tracing::info!(dir = %self.dir.display(), tickers = series.len(), "loaded CSV time series");
        Ok(series)
    }

    /// Load series from readers, in ticker order.
    ///
    /// Tickers with prices but no shares row cannot be back-computed and are
    /// skipped with a warning. The latest shares row per ticker wins.
    pub fn from_readers<R: Read>(
        prices: R,
        splits: Option<R>,
        shares: R,
    ) -> Result<Vec<TimeSeries>> {
        let mut prices_by_ticker: BTreeMap<String, Vec<PriceObservation>> = BTreeMap::new();
        for row in read_rows::<PriceRow, _>(prices)? {
            prices_by_ticker
                .entry(row.ticker)
                .or_default()
                .push(PriceObservation::new(row.date, row.close));
        }

        let mut splits_by_ticker: BTreeMap<String, Vec<SplitEvent>> = BTreeMap::new();
        if let Some(reader) = splits {
            for row in read_rows::<SplitRow, _>(reader)? {
                splits_by_ticker
                    .entry(row.ticker)
                    .or_default()
                    .push(SplitEvent::new(row.date, row.ratio));
            }
        }

        let mut shares_by_ticker: BTreeMap<String, SharesSnapshot> = BTreeMap::new();
        for row in read_rows::<SharesRow, _>(shares)? {
            let snapshot = SharesSnapshot::new(row.as_of, row.shares);
            shares_by_ticker
                .entry(row.ticker)
                .and_modify(|current| {
                    if snapshot.as_of >= current.as_of {
                        *current = snapshot;
                    }
                })
                .or_insert(snapshot);
        }

        let mut series = Vec::with_capacity(prices_by_ticker.len());
        for (ticker, prices) in prices_by_ticker {
            let Some(shares) = shares_by_ticker.get(&ticker).copied() else {
                tracing::warn!(ticker = %ticker, "no shares outstanding row, series skipped");
                continue;
            };
            let splits = splits_by_ticker.remove(&ticker).unwrap_or_default();
            series.push(TimeSeries::new(Ticker::new(ticker), prices, splits, shares));
        }

        Ok(series)
    }

    /// Tickers with prices in the directory, sorted.
    pub fn tickers(&self) -> Result<Vec<Ticker>> {
        let prices = File::open(self.dir.join(PRICES_FILE))?;
        let mut tickers: Vec<Ticker> = read_rows::<PriceRow, _>(prices)?
            .into_iter()
            .map(|row| Ticker::new(row.ticker))
            .collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }
}

//! Market Cap & Ranking
//!
//! market_cap = shares(ticker, date) × close(ticker, date), ranked per date in
//! descending order. Equal market caps fall back to ascending ticker order so
//! the ranking is reproducible regardless of input order.
//!
//! A ticker without a usable price or share count on a date is left out of
//! that date's ranking; it is never treated as zero.

use crate::config::IndexConfig;
use crate::model::{DailyMarketCap, IndexConstituency, Ticker, TimeSeries};
use crate::quality::{DataQualityKind, DataQualityLog};
use crate::shares::SharesTable;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Ranking order: larger market cap first, then ticker ascending.
pub fn rank_order(a: &DailyMarketCap, b: &DailyMarketCap) -> Ordering {
    b.market_cap
        .total_cmp(&a.market_cap)
        .then_with(|| a.ticker.cmp(&b.ticker))
}

/// Market caps keyed by date, each date ranked.
#[derive(Debug, Clone, Default)]
pub struct MarketCapTable {
    by_date: BTreeMap<NaiveDate, Vec<DailyMarketCap>>,
}

impl MarketCapTable {
    /// Build a table from unordered rows.
    pub fn from_rows(rows: impl IntoIterator<Item = DailyMarketCap>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<DailyMarketCap>> = BTreeMap::new();
        for row in rows {
            by_date.entry(row.date).or_default().push(row);
        }
        for rows in by_date.values_mut() {
            rows.sort_by(rank_order);
        }
        Self { by_date }
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    /// Ranked rows on `date`, largest first.
    pub fn ranked(&self, date: NaiveDate) -> &[DailyMarketCap] {
        self.by_date
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Row of `ticker` on `date`.
    pub fn get(&self, ticker: &Ticker, date: NaiveDate) -> Option<&DailyMarketCap> {
        self.ranked(date).iter().find(|row| &row.ticker == ticker)
    }

    /// Close of `ticker` on `date`.
    pub fn close(&self, ticker: &Ticker, date: NaiveDate) -> Option<f64> {
        self.get(ticker, date).map(|row| row.close)
    }

    /// Most recent row per ticker.
    pub fn latest_by_ticker(&self) -> BTreeMap<Ticker, DailyMarketCap> {
        let mut latest = BTreeMap::new();
        for rows in self.by_date.values() {
            for row in rows {
                latest.insert(row.ticker.clone(), row.clone());
            }
        }
        latest
    }

    /// All rows, by date then rank.
    pub fn iter(&self) -> impl Iterator<Item = &DailyMarketCap> + '_ {
        self.by_date.values().flatten()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.by_date.values().map(Vec::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// Computes market caps and selects the top-K per date.
#[derive(Debug, Clone)]
pub struct RankingEngine {
    top_k: usize,
}

impl RankingEngine {
    /// Create a ranking engine from a validated configuration.
    pub const fn new(config: &IndexConfig) -> Self {
        Self {
            top_k: config.top_k,
        }
    }

    /// Number of constituents selected per date.
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Market cap of every ticker on every date of the window.
    ///
    /// The date axis is the union of all price dates.
    pub fn market_caps(
        &self,
        series: &[TimeSeries],
        shares: &SharesTable,
        log: &mut DataQualityLog,
    ) -> MarketCapTable {
        let dates: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|ts| ts.prices.iter().map(|p| p.date))
            .collect();

        let mut rows = Vec::with_capacity(dates.len() * series.len());

        for &date in &dates {
            for ts in series {
                let Some(close) = ts.close_on(date) else {
                    log.record(
                        &ts.ticker,
                        Some(date),
                        DataQualityKind::MissingPrice,
                        "no close price",
                    );
                    continue;
                };

                if !(close.is_finite() && close >= 0.0) {
                    log.record(
                        &ts.ticker,
                        Some(date),
                        DataQualityKind::InvalidPrice,
                        format!("unusable close price {}", close),
                    );
                    continue;
                }

                let Some(count) = shares.get(&ts.ticker, date) else {
                    log.record(
                        &ts.ticker,
                        Some(date),
                        DataQualityKind::MissingShares,
                        "no back-computed shares",
                    );
                    continue;
                };

                rows.push(DailyMarketCap::new(ts.ticker.clone(), date, close, count));
            }
        }

        let table = MarketCapTable::from_rows(rows);
        tracing::debug!(
            dates = dates.len(),
            rows = table.len(),
            "computed daily market caps"
        );
        table
    }

    /// Top-K constituency for one date.
    ///
    /// Has `min(K, available)` members.
    pub fn select_on(&self, table: &MarketCapTable, date: NaiveDate) -> IndexConstituency {
        let tickers = table
            .ranked(date)
            .iter()
            .take(self.top_k)
            .map(|row| row.ticker.clone())
            .collect();
        IndexConstituency::new(date, tickers)
    }

    /// Top-K constituency for every date in the table, ascending by date.
    pub fn select(&self, table: &MarketCapTable) -> Vec<IndexConstituency> {
        table
            .dates()
            .map(|date| self.select_on(table, date))
            .collect()
    }
}

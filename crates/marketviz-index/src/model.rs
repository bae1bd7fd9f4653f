//! Data model shared by the engines.
//!
//! Inputs arrive per ticker as a [`TimeSeries`]; every derived value is keyed
//! by `(Ticker, NaiveDate)`.

use chrono::NaiveDate;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;

/// Stock ticker symbol.
///
/// Ordering is lexicographic on the symbol and is used as the ranking
/// tie-break, so output never depends on input order.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Create a ticker from a symbol.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// The symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Ticker {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// End-of-day close for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Trading date
    pub date: NaiveDate,
    /// Close price
    pub close: f64,
}

impl PriceObservation {
    /// Create a new price observation.
    pub const fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Stock split effective on `date`.
///
/// A 2-for-1 split has `ratio == 2.0`: every share before `date` became two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    /// First trading date on the post-split basis
    pub date: NaiveDate,
    /// New shares per old share
    pub ratio: f64,
}

impl SplitEvent {
    /// Create a new split event.
    pub const fn new(date: NaiveDate, ratio: f64) -> Self {
        Self { date, ratio }
    }
}

/// Most recent known shares outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharesSnapshot {
    /// Date the count was observed
    pub as_of: NaiveDate,
    /// Shares outstanding
    pub shares: u64,
}

impl SharesSnapshot {
    /// Create a new shares snapshot.
    pub const fn new(as_of: NaiveDate, shares: u64) -> Self {
        Self { as_of, shares }
    }
}

/// Everything the fetcher delivers for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Ticker the series belongs to
    pub ticker: Ticker,
    /// Close prices, ascending by date, one per date
    pub prices: Vec<PriceObservation>,
    /// Splits, ascending by date
    pub splits: Vec<SplitEvent>,
    /// Latest known shares outstanding
    pub shares: SharesSnapshot,
}

impl TimeSeries {
    /// Create a series, sorting prices and splits by date.
    ///
    /// When a date appears twice in `prices` the last observation wins.
    pub fn new(
        ticker: Ticker,
        mut prices: Vec<PriceObservation>,
        mut splits: Vec<SplitEvent>,
        shares: SharesSnapshot,
    ) -> Self {
        prices.reverse();
        prices.sort_by_key(|p| p.date);
        prices.dedup_by_key(|p| p.date);
        splits.sort_by_key(|s| s.date);

        Self {
            ticker,
            prices,
            splits,
            shares,
        }
    }

    /// Close on `date`, if observed.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.prices
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.prices[i].close)
    }

    /// First observed price date.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.first().map(|p| p.date)
    }

    /// Last observed price date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.last().map(|p| p.date)
    }

    /// Copy of the series with prices restricted to `[start, end]`.
    ///
    /// Splits are kept whole: a split after `end` still has to be walked
    /// back through to reach dates inside the window.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: self.ticker.clone(),
            prices: self
                .prices
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
            splits: self.splits.clone(),
            shares: self.shares,
        }
    }
}

/// Market capitalization of one ticker on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMarketCap {
    /// Ticker
    pub ticker: Ticker,
    /// Trading date
    pub date: NaiveDate,
    /// Close price
    pub close: f64,
    /// Back-computed shares outstanding
    pub shares: f64,
    /// `shares × close`
    pub market_cap: f64,
}

impl DailyMarketCap {
    /// Create a row, computing the market cap.
    pub fn new(ticker: Ticker, date: NaiveDate, close: f64, shares: f64) -> Self {
        Self {
            ticker,
            date,
            close,
            shares,
            market_cap: shares * close,
        }
    }
}

/// Index members on one date, ordered by descending market cap.
///
/// The order is for display only; the index itself is equal-weighted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConstituency {
    /// Trading date
    pub date: NaiveDate,
    /// Members, largest first
    pub tickers: Vec<Ticker>,
}

impl IndexConstituency {
    /// Create a new constituency.
    pub const fn new(date: NaiveDate, tickers: Vec<Ticker>) -> Self {
        Self { date, tickers }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Whether `ticker` is a member.
    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t.as_str() == ticker)
    }

    /// Members as a set.
    pub fn as_set(&self) -> BTreeSet<&Ticker> {
        self.tickers.iter().collect()
    }

    /// Members joined with commas, in rank order.
    pub fn joined(&self) -> String {
        self.tickers
            .iter()
            .map(Ticker::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Index level on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    /// Trading date
    pub date: NaiveDate,
    /// Index level
    pub level: f64,
    /// Return versus the previous level (0 on the base date)
    pub daily_return: f64,
}

impl IndexLevel {
    /// Create a new index level.
    pub const fn new(date: NaiveDate, level: f64, daily_return: f64) -> Self {
        Self {
            date,
            level,
            daily_return,
        }
    }
}

/// Tickers that entered and left the index on `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionChange {
    /// Date of the new constituency
    pub date: NaiveDate,
    /// Entrants, sorted by ticker
    pub added: Vec<Ticker>,
    /// Leavers, sorted by ticker
    pub removed: Vec<Ticker>,
}

impl CompositionChange {
    /// Compare two consecutive constituencies as sets.
    ///
    /// Returns `None` when both have the same members.
    pub fn between(previous: &IndexConstituency, current: &IndexConstituency) -> Option<Self> {
        let before = previous.as_set();
        let after = current.as_set();

        let added: Vec<Ticker> = after.difference(&before).map(|t| (*t).clone()).collect();
        let removed: Vec<Ticker> = before.difference(&after).map(|t| (*t).clone()).collect();

        if added.is_empty() && removed.is_empty() {
            None
        } else {
            Some(Self {
                date: current.date,
                added,
                removed,
            })
        }
    }

    /// Number of tickers that changed in either direction.
    pub fn turnover(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

//! Data-quality events.
//!
//! Exclusions never abort a run. Each one is logged at `warn` level and kept
//! so the caller can report how much data was dropped.

use crate::model::Ticker;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a (ticker, date) was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataQualityKind {
    /// No series was delivered for a universe ticker
    MissingSeries,
    /// No close on a date other tickers traded
    MissingPrice,
    /// Close was negative or not a number
    InvalidPrice,
    /// No back-computed shares for the date
    MissingShares,
    /// Split or shares data failed validation
    IntegrityFailure,
    /// Continuing constituent had a zero previous close
    ZeroPreviousClose,
}

impl fmt::Display for DataQualityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingSeries => "missing series",
            Self::MissingPrice => "missing price",
            Self::InvalidPrice => "invalid price",
            Self::MissingShares => "missing shares",
            Self::IntegrityFailure => "integrity failure",
            Self::ZeroPreviousClose => "zero previous close",
        };
        f.write_str(name)
    }
}

/// A single non-fatal exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityEvent {
    /// Affected ticker
    pub ticker: Ticker,
    /// Affected date, `None` when the whole series is affected
    pub date: Option<NaiveDate>,
    /// Category
    pub kind: DataQualityKind,
    /// Human-readable detail
    pub detail: String,
}

/// Number of `events` of each kind.
pub fn counts_by_kind(events: &[DataQualityEvent]) -> BTreeMap<DataQualityKind, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.kind).or_insert(0) += 1;
    }
    counts
}

/// Collects data-quality events during a run.
#[derive(Debug, Default, Clone)]
pub struct DataQualityLog {
    events: Vec<DataQualityEvent>,
}

impl DataQualityLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and keep an event.
    pub fn record(
        &mut self,
        ticker: &Ticker,
        date: Option<NaiveDate>,
        kind: DataQualityKind,
        detail: impl Into<String>,
    ) {
        let detail = detail.into();
        tracing::warn!(
            ticker = %ticker,
            date = ?date,
            kind = %kind,
            "data quality: {}",
            detail
        );
        self.events.push(DataQualityEvent {
            ticker: ticker.clone(),
            date,
            kind,
            detail,
        });
    }

    /// Recorded events in order.
    pub fn events(&self) -> &[DataQualityEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event counts per kind.
    pub fn counts(&self) -> BTreeMap<DataQualityKind, usize> {
        counts_by_kind(&self.events)
    }

    /// Consume the log.
    pub fn into_events(self) -> Vec<DataQualityEvent> {
        self.events
    }
}

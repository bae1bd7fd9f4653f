//! Index Construction
//!
//! Daily-rebalanced equal-weight index. On day t only the continuing set
//! C(t) = constituency(t−1) ∩ constituency(t) contributes:
//!
//! r(t) = Σ_{i ∈ C(t)} (p_i(t) / p_i(t−1) − 1) / K
//! level(t) = level(t−1) × (1 + r(t))
//!
//! K is the size of constituency(t−1). Entrants start contributing on the day
//! after they join; leavers stop contributing on the day they leave. Weights
//! reset to 1/K every day, so there is no drift between rebalances.

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::model::{CompositionChange, IndexConstituency, IndexLevel, Ticker};
use crate::quality::{DataQualityKind, DataQualityLog};
use crate::ranking::MarketCapTable;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Chains index levels over a sequence of constituencies.
#[derive(Debug, Clone)]
pub struct IndexEngine {
    base_value: f64,
}

impl IndexEngine {
    /// Create an engine from a validated configuration.
    pub const fn new(config: &IndexConfig) -> Self {
        Self {
            base_value: config.base_value,
        }
    }

    /// Build the index series.
    ///
    /// The base date is the first date with a non-empty constituency; earlier
    /// empty dates are skipped. Closes are read from `caps`, which holds a row
    /// for every ranked ticker.
    ///
    /// # Errors
    /// Returns [`IndexError::OutOfOrder`] if constituency dates are not
    /// strictly increasing.
    pub fn build(
        &self,
        constituencies: &[IndexConstituency],
        caps: &MarketCapTable,
        log: &mut DataQualityLog,
    ) -> Result<IndexSeries> {
        let mut levels: Vec<IndexLevel> = Vec::with_capacity(constituencies.len());
        let mut kept: Vec<IndexConstituency> = Vec::with_capacity(constituencies.len());
        let mut changes = Vec::new();
        let mut last_date: Option<NaiveDate> = None;

        for current in constituencies {
            if let Some(previous) = last_date
                && current.date <= previous
            {
                return Err(IndexError::OutOfOrder {
                    previous,
                    current: current.date,
                });
            }
            last_date = Some(current.date);

            let level = match (kept.last(), levels.last()) {
                (Some(previous), Some(previous_level)) => {
                    let daily_return = Self::period_return(previous, current, caps, log);
                    if let Some(change) = CompositionChange::between(previous, current) {
                        tracing::debug!(
                            date = %change.date,
                            added = change.added.len(),
                            removed = change.removed.len(),
                            "composition change"
                        );
                        changes.push(change);
                    }
                    IndexLevel::new(
                        current.date,
                        previous_level.level * (1.0 + daily_return),
                        daily_return,
                    )
                }
                _ if current.is_empty() => continue,
                _ => IndexLevel::new(current.date, self.base_value, 0.0),
            };

            levels.push(level);
            kept.push(current.clone());
        }

        tracing::info!(
            dates = levels.len(),
            changes = changes.len(),
            "built index series"
        );

        Ok(IndexSeries {
            base_value: self.base_value,
            levels,
            constituencies: kept,
            changes,
        })
    }

    /// Equal-weighted return over the continuing set.
    ///
    /// Zero when the continuing set is empty.
    pub fn period_return(
        previous: &IndexConstituency,
        current: &IndexConstituency,
        caps: &MarketCapTable,
        log: &mut DataQualityLog,
    ) -> f64 {
        if previous.is_empty() {
            return 0.0;
        }

        let weight = 1.0 / previous.len() as f64;
        let members = current.as_set();
        let mut total = 0.0;

        for ticker in previous.tickers.iter().filter(|t| members.contains(t)) {
            match (
                caps.close(ticker, previous.date),
                caps.close(ticker, current.date),
            ) {
                (Some(before), Some(after)) if before > 0.0 => {
                    total += (after / before - 1.0) * weight;
                }
                (Some(_), Some(_)) => log.record(
                    ticker,
                    Some(current.date),
                    DataQualityKind::ZeroPreviousClose,
                    format!("zero close on {}, return skipped", previous.date),
                ),
                _ => log.record(
                    ticker,
                    Some(current.date),
                    DataQualityKind::MissingPrice,
                    "continuing constituent without close",
                ),
            }
        }

        total
    }
}

/// Output of the index construction: levels, members and turnover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSeries {
    base_value: f64,
    levels: Vec<IndexLevel>,
    constituencies: Vec<IndexConstituency>,
    changes: Vec<CompositionChange>,
}

impl IndexSeries {
    /// Assemble a series from stored parts.
    ///
    /// Used when reading a previously computed index back from storage.
    pub const fn from_parts(
        base_value: f64,
        levels: Vec<IndexLevel>,
        constituencies: Vec<IndexConstituency>,
        changes: Vec<CompositionChange>,
    ) -> Self {
        Self {
            base_value,
            levels,
            constituencies,
            changes,
        }
    }

    /// Index level on the base date.
    pub const fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Daily levels, ascending by date.
    pub fn levels(&self) -> &[IndexLevel] {
        &self.levels
    }

    /// Daily constituencies, aligned with [`Self::levels`].
    pub fn constituencies(&self) -> &[IndexConstituency] {
        &self.constituencies
    }

    /// Composition changes, ascending by date.
    pub fn changes(&self) -> &[CompositionChange] {
        &self.changes
    }

    /// Dates on which the composition changed.
    pub fn change_dates(&self) -> Vec<NaiveDate> {
        self.changes.iter().map(|c| c.date).collect()
    }

    /// Whether the series holds no dates.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Most recent level.
    pub fn latest(&self) -> Option<&IndexLevel> {
        self.levels.last()
    }

    /// Most recent constituency.
    pub fn latest_constituency(&self) -> Option<&IndexConstituency> {
        self.constituencies.last()
    }

    /// Level on `date`.
    pub fn level(&self, date: NaiveDate) -> Option<&IndexLevel> {
        self.levels
            .binary_search_by_key(&date, |l| l.date)
            .ok()
            .map(|i| &self.levels[i])
    }

    /// Constituency on `date`.
    pub fn constituency(&self, date: NaiveDate) -> Option<&IndexConstituency> {
        self.constituencies
            .binary_search_by_key(&date, |c| c.date)
            .ok()
            .map(|i| &self.constituencies[i])
    }

    /// Composition change on `date`, if the composition changed.
    pub fn change(&self, date: NaiveDate) -> Option<&CompositionChange> {
        self.changes
            .binary_search_by_key(&date, |c| c.date)
            .ok()
            .map(|i| &self.changes[i])
    }

    /// Constituency on `date` or the closest earlier date within
    /// `max_lookback_days` (weekends and holidays have no data).
    pub fn constituency_on_or_before(
        &self,
        date: NaiveDate,
        max_lookback_days: u32,
    ) -> Option<&IndexConstituency> {
        let earliest = date - Duration::days(i64::from(max_lookback_days));
        let idx = self.constituencies.partition_point(|c| c.date <= date);
        idx.checked_sub(1)
            .map(|i| &self.constituencies[i])
            .filter(|c| c.date >= earliest)
    }

    /// Tickers that were in the index on any date.
    pub fn all_members(&self) -> Vec<Ticker> {
        let mut members: Vec<Ticker> = self
            .constituencies
            .iter()
            .flat_map(|c| c.tickers.iter().cloned())
            .collect();
        members.sort();
        members.dedup();
        members
    }

    /// Rebuild levels from the base value and the daily returns.
    pub fn recompute_levels(&self) -> Vec<f64> {
        let mut level = self.base_value;
        self.levels
            .iter()
            .enumerate()
            .map(|(i, l)| {
                if i > 0 {
                    level *= 1.0 + l.daily_return;
                }
                level
            })
            .collect()
    }

    /// Whether recomputed levels match stored levels within `tolerance`
    /// (relative).
    pub fn is_consistent(&self, tolerance: f64) -> bool {
        self.recompute_levels()
            .iter()
            .zip(&self.levels)
            .all(|(recomputed, stored)| {
                (recomputed - stored.level).abs() <= tolerance * stored.level.abs().max(1.0)
            })
    }
}

//! Error types for index construction.

use crate::model::Ticker;
use chrono::NaiveDate;
use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while building the index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// Split or shares data that cannot produce a valid share count.
    ///
    /// Fatal for the affected ticker and date range only.
    #[error("Data integrity error for {ticker}: {reason}")]
    DataIntegrity {
        /// Ticker whose series is invalid
        ticker: Ticker,
        /// What was wrong with the series
        reason: String,
    },

    /// Absent price or shares value for a (ticker, date) pair.
    #[error("Missing data for {ticker} on {date}")]
    MissingData {
        /// Ticker that was queried
        ticker: Ticker,
        /// Date with no usable value
        date: NaiveDate,
    },

    /// Invalid top-K, lookback window, or base value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Constituency dates were not strictly increasing.
    #[error("Dates out of order: {current} does not follow {previous}")]
    OutOfOrder {
        /// Last date that was processed
        previous: NaiveDate,
        /// Date that arrived after it
        current: NaiveDate,
    },

    /// Nothing to compute on.
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

impl IndexError {
    /// Build a [`IndexError::DataIntegrity`] error.
    pub fn integrity(ticker: &Ticker, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            ticker: ticker.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the whole run rather than one ticker.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::OutOfOrder { .. } | Self::EmptyInput(_)
        )
    }
}

//! Daily closes and split events from Yahoo Finance.

use crate::error::{DataError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use marketviz_index::{PriceObservation, SplitEvent};
use std::time::Duration;
use tokio::time::sleep;
use yahoo_finance_api as yahoo;

/// Price history of one symbol as delivered by Yahoo.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteHistory {
    /// Unadjusted daily closes, ascending
    pub prices: Vec<PriceObservation>,
    /// Splits, ascending
    pub splits: Vec<SplitEvent>,
}

/// Yahoo Finance quote provider with rate limiting.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with default rate limiting (250 ms between requests).
    ///
    /// # Errors
    /// Returns [`DataError::YahooApi`] if the connector cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a provider with custom rate limiting.
    ///
    /// # Errors
    /// Returns [`DataError::YahooApi`] if the connector cannot be built.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay,
        })
    }

    /// Fetch daily closes and splits for `symbol` between `start` and `end`.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<QuoteHistory> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }

        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset(start)?;
        let end_time = to_offset(end)?;

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::missing(
                symbol,
                "No data returned from Yahoo Finance",
            ));
        }

        let prices = quotes
            .iter()
            .map(|q| Ok(PriceObservation::new(to_date(q.timestamp as i64)?, q.close)))
            .collect::<Result<Vec<_>>>()?;

        // A symbol with no split history has no split events in the response.
        let splits = response
            .splits()
            .unwrap_or_default()
            .iter()
            .map(|s| {
                Ok(SplitEvent::new(
                    to_date(s.date as i64)?,
                    split_ratio(s.numerator as f64, s.denominator as f64),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            symbol,
            prices = prices.len(),
            splits = splits.len(),
            "fetched quote history"
        );

        sleep(self.rate_limit_delay).await;

        Ok(QuoteHistory { prices, splits })
    }
}

/// New shares per old share. A zero denominator yields `NaN`, which the
/// shares engine rejects as an integrity failure.
pub fn split_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

fn to_offset(at: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

/// Trading date of a Yahoo timestamp (seconds since the epoch, UTC).
pub fn to_date(timestamp: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::TimeConversion(format!("timestamp {} out of range", timestamp)))
}

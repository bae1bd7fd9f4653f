//! Yahoo Finance data providers.

pub mod fundamentals;
pub mod quotes;

pub use fundamentals::YahooFundamentalsProvider;
pub use quotes::{QuoteHistory, YahooQuoteProvider};

use crate::error::Result;
use chrono::{DateTime, Utc};
use marketviz_index::{Ticker, TimeSeries};

/// Assembles a complete [`TimeSeries`] per ticker from quote history and key
/// statistics.
#[derive(Debug)]
pub struct YahooSeriesFetcher {
    quotes: YahooQuoteProvider,
    fundamentals: YahooFundamentalsProvider,
}

impl YahooSeriesFetcher {
    /// Create a fetcher with default rate limiting.
    ///
    /// # Errors
    /// Returns an error if either HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Ok(Self::from_providers(
            YahooQuoteProvider::new()?,
            YahooFundamentalsProvider::new()?,
        ))
    }

    /// Create a fetcher from existing providers.
    pub const fn from_providers(
        quotes: YahooQuoteProvider,
        fundamentals: YahooFundamentalsProvider,
    ) -> Self {
        Self {
            quotes,
            fundamentals,
        }
    }

    /// Fetch closes, splits and current shares outstanding of `ticker`.
    ///
    /// The shares snapshot is dated on the day `end` falls on.
    pub async fn fetch_series(
        &self,
        ticker: &Ticker,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeries> {
        let history = self.quotes.fetch_history(ticker.as_str(), start, end).await?;
        let shares = self
            .fundamentals
            .fetch_shares(ticker.as_str(), end.date_naive())
            .await?;

        Ok(TimeSeries::new(
            ticker.clone(),
            history.prices,
            history.splits,
            shares,
        ))
    }
}

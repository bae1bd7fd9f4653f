//! Current shares outstanding from Yahoo Finance key statistics.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use marketviz_index::SharesSnapshot;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

/// Quote summary endpoint; the symbol is appended to the path.
pub const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<QuoteSummaryError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryError {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    shares_outstanding: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

/// Extract shares outstanding from a quote summary body.
///
/// # Errors
/// Returns [`DataError::YahooApi`] for an error payload and
/// [`DataError::MissingData`] when the count is absent or not positive.
pub fn parse_shares_outstanding(symbol: &str, body: &str) -> Result<u64> {
    let response: QuoteSummaryResponse = serde_json::from_str(body)?;

    if let Some(error) = response.quote_summary.error {
        return Err(DataError::YahooApi(error.description));
    }

    let raw = response
        .quote_summary
        .result
        .unwrap_or_default()
        .into_iter()
        .find_map(|r| r.default_key_statistics?.shares_outstanding?.raw);

    match raw {
        Some(shares) if shares.is_finite() && shares >= 1.0 => Ok(shares.round() as u64),
        Some(shares) => Err(DataError::missing(
            symbol,
            format!("invalid shares outstanding {}", shares),
        )),
        None => Err(DataError::missing(symbol, "shares outstanding not available")),
    }
}

/// Fetches the current shares outstanding of a symbol.
#[derive(Debug, Clone)]
pub struct YahooFundamentalsProvider {
    client: reqwest::Client,
    rate_limit_delay: Duration,
}

impl YahooFundamentalsProvider {
    /// Create a provider with default rate limiting (250 ms between requests).
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(Duration::from_millis(250))
    }

    /// Create a provider with custom rate limiting.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn with_rate_limit(rate_limit_delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()?;
        Ok(Self {
            client,
            rate_limit_delay,
        })
    }

    /// Shares outstanding of `symbol`, observed on `as_of`.
    pub async fn fetch_shares(&self, symbol: &str, as_of: NaiveDate) -> Result<SharesSnapshot> {
        if symbol.is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("modules", "defaultKeyStatistics")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "quote summary for {} returned status {}",
                symbol,
                response.status()
            )));
        }

        let body = response.text().await?;
        let shares = parse_shares_outstanding(symbol, &body)?;

        sleep(self.rate_limit_delay).await;

        Ok(SharesSnapshot::new(as_of, shares))
    }
}

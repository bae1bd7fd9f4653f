//! Candidate universe from the Nasdaq stock screener.

use crate::error::{DataError, Result};
use marketviz_index::Ticker;
use serde::{Deserialize, Serialize};

/// Screener endpoint.
pub const NASDAQ_SCREENER_URL: &str = "https://api.nasdaq.com/api/screener/stocks";

/// Default number of candidates requested.
pub const DEFAULT_FETCH_COUNT: usize = 130;

/// One screener row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    /// Ticker with `/` replaced by `-` (`BRK/B` becomes `BRK-B`)
    pub ticker: Ticker,
    /// Company name
    pub name: String,
    /// Current market cap in dollars, when reported
    pub market_cap: Option<f64>,
    /// Last sale price, when reported
    pub last_sale: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    data: Option<ScreenerData>,
}

#[derive(Debug, Deserialize)]
struct ScreenerData {
    table: ScreenerTable,
}

#[derive(Debug, Deserialize)]
struct ScreenerTable {
    #[serde(default)]
    rows: Vec<ScreenerRow>,
}

#[derive(Debug, Deserialize)]
struct ScreenerRow {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "marketCap")]
    market_cap: Option<String>,
    #[serde(default)]
    lastsale: Option<String>,
}

/// Parse a screener number such as `"$229.87"` or `"3,481,000,000,000"`.
///
/// Empty cells and `"NA"` give `None`.
pub fn parse_screener_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a screener symbol to the ticker format used by Yahoo.
pub fn normalize_symbol(symbol: &str) -> Ticker {
    Ticker::new(symbol.trim().replace('/', "-"))
}

/// Parse a screener JSON body into universe entries, largest market cap
/// first.
///
/// # Errors
/// Returns [`DataError::Serialization`] for malformed JSON and
/// [`DataError::Nasdaq`] when the body carries no table.
pub fn parse_screener(body: &str) -> Result<Vec<UniverseEntry>> {
    let response: ScreenerResponse = serde_json::from_str(body)?;
    let table = response
        .data
        .ok_or_else(|| DataError::Nasdaq("response has no data table".to_string()))?
        .table;

    let mut entries: Vec<UniverseEntry> = table
        .rows
        .into_iter()
        .filter(|row| !row.symbol.trim().is_empty())
        .map(|row| UniverseEntry {
            ticker: normalize_symbol(&row.symbol),
            name: row.name,
            market_cap: row.market_cap.as_deref().and_then(parse_screener_number),
            last_sale: row.lastsale.as_deref().and_then(parse_screener_number),
        })
        .collect();

    // Rows without a market cap sort last.
    entries.sort_by(|a, b| {
        b.market_cap
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.market_cap.unwrap_or(f64::NEG_INFINITY))
    });

    Ok(entries)
}

/// Fetches the candidate universe from the Nasdaq screener.
#[derive(Debug, Clone)]
pub struct NasdaqUniverseProvider {
    client: reqwest::Client,
    url: String,
}

impl NasdaqUniverseProvider {
    /// Create a provider for the public screener endpoint.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_url(NASDAQ_SCREENER_URL)
    }

    /// Create a provider for a custom endpoint.
    ///
    /// # Errors
    /// Returns [`DataError::Network`] if the HTTP client cannot be built.
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Fetch up to `limit` candidates.
    pub async fn fetch(&self, limit: usize) -> Result<Vec<UniverseEntry>> {
        tracing::info!(limit, url = %self.url, "fetching universe");

        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", limit.to_string())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "screener returned status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let mut entries = parse_screener(&body)?;
        entries.truncate(limit);

        tracing::debug!(count = entries.len(), "parsed universe");
        Ok(entries)
    }

    /// Fetch up to `limit` tickers.
    pub async fn fetch_tickers(&self, limit: usize) -> Result<Vec<Ticker>> {
        Ok(self
            .fetch(limit)
            .await?
            .into_iter()
            .map(|entry| entry.ticker)
            .collect())
    }
}

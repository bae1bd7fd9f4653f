//! Candidate ticker universes.
//!
//! The index ranks every ticker of a universe on each date and keeps the top
//! K. A universe is usually the Nasdaq screener ordered by current market cap
//! ([`TickerUniverse::from_entries`]); [`LargeCapUniverse`] is a static
//! fallback for offline use.

pub mod large_cap;

pub use large_cap::LargeCapUniverse;

use marketviz_data::UniverseEntry;
use marketviz_index::Ticker;
use serde::{Deserialize, Serialize};

/// Trait for stock universes.
pub trait Universe {
    /// All tickers in the universe, in provider order.
    fn tickers(&self) -> Vec<Ticker>;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.tickers().iter().any(|t| t.as_str() == symbol)
    }

    /// Get the number of tickers.
    fn size(&self) -> usize {
        self.tickers().len()
    }

    /// The first `limit` tickers.
    fn take(&self, limit: usize) -> Vec<Ticker> {
        let mut tickers = self.tickers();
        tickers.truncate(limit);
        tickers
    }
}

/// An explicit list of tickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerUniverse {
    tickers: Vec<Ticker>,
}

impl TickerUniverse {
    /// Create a universe from tickers, dropping repeats but keeping order.
    pub fn new(tickers: impl IntoIterator<Item = Ticker>) -> Self {
        let mut unique: Vec<Ticker> = Vec::new();
        for ticker in tickers {
            if !unique.contains(&ticker) {
                unique.push(ticker);
            }
        }
        Self { tickers: unique }
    }

    /// Universe of screener entries, in screener order.
    pub fn from_entries(entries: &[UniverseEntry]) -> Self {
        Self::new(entries.iter().map(|e| e.ticker.clone()))
    }

    /// Whether the universe has no tickers.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

impl Universe for TickerUniverse {
    fn tickers(&self) -> Vec<Ticker> {
        self.tickers.clone()
    }
}

impl FromIterator<Ticker> for TickerUniverse {
    fn from_iter<I: IntoIterator<Item = Ticker>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe(symbols: &[&str]) -> TickerUniverse {
        symbols.iter().map(|s| Ticker::new(*s)).collect()
    }

    #[test]
    fn test_universe_trait() {
        let universe = universe(&["AAPL", "MSFT", "AAPL", "NVDA"]);

        assert_eq!(universe.size(), 3);
        assert!(universe.contains("MSFT"));
        assert!(!universe.contains("NOTREAL"));
        assert_eq!(universe.take(2), vec![Ticker::new("AAPL"), Ticker::new("MSFT")]);
    }

    #[test]
    fn test_from_entries_keeps_order() {
        let entries = vec![
            UniverseEntry {
                ticker: Ticker::new("NVDA"),
                name: "NVIDIA Corporation Common Stock".to_string(),
                market_cap: Some(3.2e12),
                last_sale: Some(131.0),
            },
            UniverseEntry {
                ticker: Ticker::new("BRK-B"),
                name: "Berkshire Hathaway Inc.".to_string(),
                market_cap: Some(9.8e11),
                last_sale: Some(455.0),
            },
        ];

        let universe = TickerUniverse::from_entries(&entries);
        assert_eq!(universe.tickers(), vec![Ticker::new("NVDA"), Ticker::new("BRK-B")]);
    }

    #[test]
    fn test_deserialize_from_json_list() {
        let universe: TickerUniverse = serde_json::from_str(r#"["AAPL", "MSFT"]"#).unwrap();
        assert_eq!(universe.size(), 2);
    }
}

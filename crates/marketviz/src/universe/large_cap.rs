//! Static universe of large US listings.

use crate::universe::Universe;
use marketviz_index::Ticker;

/// Large US listings in Yahoo Finance symbology, roughly ordered by size.
///
/// Used when the Nasdaq screener cannot be reached. The ranking engine
/// orders tickers by their own market caps, so the order here only matters
/// when the list is truncated.
const LARGE_CAP_SYMBOLS: &[&str] = &[
    "AAPL", "NVDA", "MSFT", "GOOGL", "AMZN", "META", "AVGO", "TSLA", "BRK-B", "LLY",
    "JPM", "WMT", "V", "ORCL", "UNH", "XOM", "MA", "COST", "NFLX", "PG",
    "JNJ", "HD", "ABBV", "BAC", "KO", "CRM", "TMUS", "CVX", "PLTR", "CSCO",
    "WFC", "IBM", "MRK", "AMD", "PM", "ABT", "LIN", "MCD", "GE", "ACN",
    "PEP", "ADBE", "NOW", "DIS", "ISRG", "TMO", "GS", "INTU", "T", "QCOM",
    "TXN", "VZ", "AXP", "CAT", "RTX", "BKNG", "MS", "SPGI", "AMGN", "PGR",
    "BSX", "LOW", "UBER", "PFE", "DHR", "AMAT", "BLK", "UNP", "NEE", "SCHW",
    "C", "TJX", "HON", "SYK", "ANET", "CMCSA", "COP", "BX", "PANW", "DE",
    "ADP", "GILD", "LMT", "VRTX", "MU", "FI", "BA", "MDT", "ADI", "MMC",
    "SBUX", "KKR", "CB", "LRCX", "PLD", "INTC", "KLAC", "SO", "MO", "ICE",
    "AMT", "ELV", "UPS", "CRWD", "WM", "SHW", "DUK", "CI", "EQIX", "APH",
    "BMY", "MCK", "CME", "PH", "AON", "CDNS", "SNPS", "ABNB", "MDLZ", "PYPL",
    "CTAS", "TT", "ORLY", "MSI", "ZTS", "REGN", "CL", "ITW", "WELL", "MAR",
];

/// Fixed universe of large US listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargeCapUniverse;

impl LargeCapUniverse {
    /// Create the universe.
    pub const fn new() -> Self {
        Self
    }
}

impl Universe for LargeCapUniverse {
    fn tickers(&self) -> Vec<Ticker> {
        LARGE_CAP_SYMBOLS.iter().map(|s| Ticker::new(*s)).collect()
    }

    fn contains(&self, symbol: &str) -> bool {
        LARGE_CAP_SYMBOLS.contains(&symbol)
    }

    fn size(&self) -> usize {
        LARGE_CAP_SYMBOLS.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeSet;

    #[test]
    fn test_large_cap_universe() {
        let universe = LargeCapUniverse::new();

        assert_eq!(universe.size(), 130);
        assert_eq!(universe.tickers().len(), universe.size());
        assert_eq!(universe.take(3).len(), 3);
    }

    #[rstest]
    #[case("AAPL", true)]
    #[case("BRK-B", true)]
    #[case("BRK.B", false)]
    #[case("aapl", false)]
    fn test_contains(#[case] symbol: &str, #[case] expected: bool) {
        assert_eq!(LargeCapUniverse::new().contains(symbol), expected);
    }

    #[test]
    fn test_symbols_are_unique() {
        let unique: BTreeSet<&str> = LARGE_CAP_SYMBOLS.iter().copied().collect();
        assert_eq!(unique.len(), LARGE_CAP_SYMBOLS.len());
    }
}

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/marketviz/marketviz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod csv_source;
pub mod error;
pub mod nasdaq;
pub mod store;
pub mod yahoo;

pub use csv_source::CsvSource;
pub use error::{DataError, Result};
pub use nasdaq::{NasdaqUniverseProvider, UniverseEntry};
pub use store::{IndexStore, StoreStats};
pub use yahoo::{YahooFundamentalsProvider, YahooQuoteProvider, YahooSeriesFetcher};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

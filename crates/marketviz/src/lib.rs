#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/marketviz/marketviz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod universe;

// Re-export main types from sub-crates
pub use marketviz_data as data;
pub use marketviz_index as index;
pub use marketviz_output as output;

pub use universe::{LargeCapUniverse, TickerUniverse, Universe};

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

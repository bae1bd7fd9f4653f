#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/marketviz/marketviz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod construction;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod ranking;
pub mod shares;

pub use config::IndexConfig;
pub use construction::{IndexEngine, IndexSeries};
pub use error::{IndexError, Result};
pub use model::{
    CompositionChange, DailyMarketCap, IndexConstituency, IndexLevel, PriceObservation,
    SharesSnapshot, SplitEvent, Ticker, TimeSeries,
};
pub use pipeline::{IndexPipeline, IndexRun};
pub use quality::{DataQualityEvent, DataQualityKind, DataQualityLog, counts_by_kind};
pub use ranking::{MarketCapTable, RankingEngine};
pub use shares::{IntegrityFailure, SharesEngine, SharesTable, back_compute};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

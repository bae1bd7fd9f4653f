#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/marketviz/marketviz/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod performance;
pub mod report;
pub mod summary;

pub use export::{
    CompositionChangeRecord, CompositionRecord, ExportError, ExportFormat, Exporter, IndexExport,
};
pub use performance::{PerformanceRecord, performance_records};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{IndexSummary, MarketCapDistribution, MarketCapSlice, OTHERS_LABEL, RecentMetric};

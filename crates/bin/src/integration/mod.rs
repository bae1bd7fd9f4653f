//! Glue between the CLI, the data providers and the index pipeline.
//!
//! Fetching is the only concurrent stage; everything after it runs on data
//! already in memory.

pub(crate) mod cache_manager;
pub(crate) mod data_pipeline;

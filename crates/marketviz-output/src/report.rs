//! JSON reports of index runs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A report on one index run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Index name.
    pub index: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// First and last index dates, when known.
    pub period: Option<(NaiveDate, NaiveDate)>,

    /// Number of constituents.
    pub top_k: usize,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report.
    pub fn new(
        index: String,
        period: Option<(NaiveDate, NaiveDate)>,
        top_k: usize,
        contents: serde_json::Value,
    ) -> Self {
        Self {
            index,
            timestamp: Utc::now(),
            period,
            top_k,
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    index: Option<String>,
    period: Option<(NaiveDate, NaiveDate)>,
    top_k: Option<usize>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the index name.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set the covered period.
    pub const fn period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period = Some((start, end));
        self
    }

    /// Set the constituent count.
    pub const fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the report contents from any serializable value.
    pub fn contents<T: Serialize>(mut self, contents: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(contents)?);
        Ok(self)
    }

    /// Build the report.
    pub fn build(self) -> Report {
        Report::new(
            self.index.unwrap_or_else(|| "MarketViz".to_string()),
            self.period,
            self.top_k.unwrap_or(100),
            self.contents.unwrap_or(serde_json::Value::Null),
        )
    }
}

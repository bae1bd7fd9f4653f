//! Export of index tables.
//!
//! Three tables describe an index run: daily performance, the ranked
//! composition of every date and the composition changes. Each can be written
//! as CSV or JSON through the [`Exporter`] trait, and [`IndexExport`] writes
//! all of them into a directory.

use crate::performance::{PerformanceRecord, performance_records};
use chrono::NaiveDate;
use marketviz_index::{CompositionChange, IndexSeries, Ticker};
use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// File stem of the performance table.
pub const PERFORMANCE_STEM: &str = "performance";
/// File stem of the composition table.
pub const COMPOSITION_STEM: &str = "composition";
/// File stem of the composition changes table.
pub const CHANGES_STEM: &str = "composition_changes";

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFrame evaluation error.
    #[error("DataFrame error: {0}")]
    Polars(#[from] PolarsError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One member of the index on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRecord {
    /// Date of the constituency.
    pub date: NaiveDate,

    /// Market cap rank, starting at 1.
    pub rank: usize,

    /// Member ticker.
    pub ticker: String,
}

impl CompositionRecord {
    /// Flatten every constituency of `series` into ranked rows.
    pub fn from_series(series: &IndexSeries) -> Vec<Self> {
        series
            .constituencies()
            .iter()
            .flat_map(|c| {
                c.tickers.iter().enumerate().map(|(i, ticker)| Self {
                    date: c.date,
                    rank: i + 1,
                    ticker: ticker.to_string(),
                })
            })
            .collect()
    }
}

/// Composition change of one date in `+(added) , -(removed)` notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionChangeRecord {
    /// Date of the constituency.
    pub date: NaiveDate,

    /// `+(A, B) , -(C)`, or `-` when the composition did not change.
    pub changes: String,
}

impl CompositionChangeRecord {
    /// Notation for an optional change.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use marketviz_index::{CompositionChange, Ticker};
    /// use marketviz_output::CompositionChangeRecord;
    ///
    /// let change = CompositionChange {
    ///     date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
    ///     added: vec![Ticker::new("AVGO")],
    ///     removed: vec![Ticker::new("BRK-B"), Ticker::new("TSLA")],
    /// };
    /// assert_eq!(CompositionChangeRecord::notation(Some(&change)), "+(AVGO) , -(BRK-B, TSLA)");
    /// assert_eq!(CompositionChangeRecord::notation(None), "-");
    /// ```
    pub fn notation(change: Option<&CompositionChange>) -> String {
        match change {
            Some(c) if c.turnover() > 0 => {
                format!("+({}) , -({})", join(&c.added), join(&c.removed))
            }
            _ => "-".to_string(),
        }
    }

    /// One row per constituency date of `series`.
    pub fn from_series(series: &IndexSeries) -> Vec<Self> {
        series
            .constituencies()
            .iter()
            .map(|c| Self {
                date: c.date,
                changes: Self::notation(series.change(c.date)),
            })
            .collect()
    }
}

fn join(tickers: &[Ticker]) -> String {
    tickers
        .iter()
        .map(Ticker::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn records_to_string<T: Serialize>(
    records: &[T],
    format: ExportFormat,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            for record in records {
                wtr.serialize(record)?;
            }
            let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
            String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
        }
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl Exporter for Vec<PerformanceRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        records_to_string(self, format)
    }
}

impl Exporter for Vec<CompositionRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        records_to_string(self, format)
    }
}

impl Exporter for Vec<CompositionChangeRecord> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        records_to_string(self, format)
    }
}

/// The three tables of an index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExport {
    /// Daily levels and returns.
    pub performance: Vec<PerformanceRecord>,

    /// Ranked members per date.
    pub composition: Vec<CompositionRecord>,

    /// Change notation per date.
    pub changes: Vec<CompositionChangeRecord>,
}

impl IndexExport {
    /// Build the tables of `series`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Polars`] if the performance frame fails.
    pub fn from_series(series: &IndexSeries) -> Result<Self, ExportError> {
        Ok(Self {
            performance: performance_records(series.levels())?,
            composition: CompositionRecord::from_series(series),
            changes: CompositionChangeRecord::from_series(series),
        })
    }

    /// Write each table to its own file in `dir`, creating the directory.
    ///
    /// Returns the written paths in table order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_to_dir(&self, dir: &Path, format: ExportFormat) -> Result<Vec<PathBuf>, ExportError> {
        fs::create_dir_all(dir)?;

        let path = |stem: &str| dir.join(format!("{}.{}", stem, format.extension()));
        let performance = path(PERFORMANCE_STEM);
        let composition = path(COMPOSITION_STEM);
        let changes = path(CHANGES_STEM);

        self.performance.export_to_file(&performance, format)?;
        self.composition.export_to_file(&composition, format)?;
        self.changes.export_to_file(&changes, format)?;

        tracing::info!(dir = %dir.display(), format = format.extension(), "exported index tables");
        Ok(vec![performance, composition, changes])
    }
}

impl Exporter for IndexExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => Err(ExportError::InvalidFormat(
                "an index export holds three tables; write CSV with write_to_dir".to_string(),
            )),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

//! Daily and cumulative return metrics of an index level series.

use chrono::NaiveDate;
use marketviz_index::IndexLevel;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the performance table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Trading date.
    pub date: NaiveDate,

    /// Index level at the close.
    pub level: f64,

    /// Change against the previous level in percent, 0 on the first date.
    pub daily_return_pct: f64,

    /// Change against the first level in percent.
    pub cumulative_return_pct: f64,
}

/// Compute the performance table of `levels`.
///
/// Levels must be ordered by date, as produced by the index engine.
///
/// # Errors
///
/// Returns a [`PolarsError`] if the frame cannot be built or evaluated.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use marketviz_index::IndexLevel;
/// use marketviz_output::performance_records;
///
/// let d0 = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
/// let d1 = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
/// let levels = vec![IndexLevel::new(d0, 1000.0, 0.0), IndexLevel::new(d1, 1050.0, 0.05)];
///
/// let records = performance_records(&levels).unwrap();
/// assert!((records[1].cumulative_return_pct - 5.0).abs() < 1e-9);
/// ```
pub fn performance_records(levels: &[IndexLevel]) -> PolarsResult<Vec<PerformanceRecord>> {
    if levels.is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<f64> = levels.iter().map(|l| l.level).collect();
    let frame = df!("level" => values)?
        .lazy()
        .with_columns([
            ((col("level") / col("level").shift(lit(1)) - lit(1.0)) * lit(100.0))
                .fill_null(lit(0.0))
                .alias("daily_return_pct"),
            ((col("level") / col("level").first() - lit(1.0)) * lit(100.0))
                .alias("cumulative_return_pct"),
        ])
        .collect()?;

    let daily = frame.column("daily_return_pct")?.f64()?;
    let cumulative = frame.column("cumulative_return_pct")?.f64()?;

    Ok(levels
        .iter()
        .zip(daily.into_iter().zip(cumulative))
        .map(|(level, (daily, cumulative))| PerformanceRecord {
            date: level.date,
            level: level.level,
            daily_return_pct: daily.unwrap_or(0.0),
            cumulative_return_pct: cumulative.unwrap_or(0.0),
        })
        .collect())
}

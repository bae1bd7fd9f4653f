//! Index summary and market cap distribution.
//!
//! [`IndexSummary`] condenses an [`IndexSeries`] into the headline numbers of
//! a run plus a table of the most recent days. [`MarketCapDistribution`]
//! splits the latest constituency into its largest members and an `OTHERS`
//! bucket.

use crate::export::CompositionChangeRecord;
use crate::performance::{PerformanceRecord, performance_records};
use chrono::NaiveDate;
use marketviz_index::{DailyMarketCap, IndexConstituency, IndexSeries, Ticker};
use polars::prelude::PolarsResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label of the bucket holding the members outside the top slices.
pub const OTHERS_LABEL: &str = "OTHERS";

/// One day of the recent metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMetric {
    /// Level and returns of the day.
    pub performance: PerformanceRecord,

    /// Composition change notation of the day.
    pub changes: String,
}

/// Headline figures of an index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Index name.
    pub name: String,

    /// First index date.
    pub period_start: NaiveDate,

    /// Latest index date.
    pub period_end: NaiveDate,

    /// Level of the first date.
    pub base_value: f64,

    /// Level of the latest date.
    pub current_value: f64,

    /// Latest level minus the previous one.
    pub daily_change: f64,

    /// Latest daily return in percent.
    pub daily_return_pct: f64,

    /// Return since the first date in percent.
    pub cumulative_return_pct: f64,

    /// Members of the latest constituency.
    pub constituent_count: usize,

    /// Dates on which the composition changed.
    pub change_count: usize,

    /// Most recent days, newest first.
    pub recent: Vec<RecentMetric>,
}

impl IndexSummary {
    /// Summarize `series`, keeping the last `recent_days` days in the table.
    ///
    /// Returns `Ok(None)` for a series without levels.
    ///
    /// # Errors
    ///
    /// Returns a polars error if the performance frame cannot be evaluated.
    pub fn from_series(
        name: impl Into<String>,
        series: &IndexSeries,
        recent_days: usize,
    ) -> PolarsResult<Option<Self>> {
        let records = performance_records(series.levels())?;
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Ok(None);
        };

        let previous = records
            .len()
            .checked_sub(2)
            .map_or(last.level, |i| records[i].level);

        let recent = records
            .iter()
            .rev()
            .take(recent_days)
            .map(|r| RecentMetric {
                performance: *r,
                changes: CompositionChangeRecord::notation(series.change(r.date)),
            })
            .collect();

        Ok(Some(Self {
            name: name.into(),
            period_start: first.date,
            period_end: last.date,
            base_value: first.level,
            current_value: last.level,
            daily_change: last.level - previous,
            daily_return_pct: last.daily_return_pct,
            cumulative_return_pct: last.cumulative_return_pct,
            constituent_count: series.latest_constituency().map_or(0, IndexConstituency::len),
            change_count: series.changes().len(),
            recent,
        }))
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nIndex Summary: {}\n", self.name));
        output.push_str(&format!(
            "Period: {} to {}\n",
            self.period_start, self.period_end
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!(
            "  Current Value:            {:.2}\n",
            self.current_value
        ));
        output.push_str(&format!(
            "  Daily Change:             {:+.2} ({:+.2}%)\n",
            self.daily_change, self.daily_return_pct
        ));
        output.push_str(&format!(
            "  Cumulative Return:        {:+.2}% (base {:.2})\n",
            self.cumulative_return_pct, self.base_value
        ));
        output.push_str(&format!(
            "  Constituents:             {}\n",
            self.constituent_count
        ));
        output.push_str(&format!(
            "  Composition Changes:      {}\n",
            self.change_count
        ));

        if !self.recent.is_empty() {
            output.push_str("\nRecent Metrics:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<12} {:>12} {:>12} {:>12}  {}\n",
                "Date", "Level", "Daily %", "Cumul. %", "Changes"
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');

            for metric in &self.recent {
                let p = &metric.performance;
                output.push_str(&format!(
                    "{:<12} {:>12.2} {:>11.2}% {:>11.2}%  {}\n",
                    p.date.to_string(),
                    p.level,
                    p.daily_return_pct,
                    p.cumulative_return_pct,
                    metric.changes
                ));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Index Summary: {}\n\n", self.name));
        output.push_str(&format!(
            "**Period:** {} to {}\n\n",
            self.period_start, self.period_end
        ));

        output.push_str(&format!("- **Current Value:** {:.2}\n", self.current_value));
        output.push_str(&format!(
            "- **Daily Change:** {:+.2} ({:+.2}%)\n",
            self.daily_change, self.daily_return_pct
        ));
        output.push_str(&format!(
            "- **Cumulative Return:** {:+.2}%\n",
            self.cumulative_return_pct
        ));
        output.push_str(&format!("- **Constituents:** {}\n", self.constituent_count));
        output.push_str(&format!(
            "- **Composition Changes:** {}\n\n",
            self.change_count
        ));

        if !self.recent.is_empty() {
            output.push_str("## Recent Metrics\n\n");
            output.push_str("| Date | Level | Daily Return (%) | Cumulative Return (%) | Composition Changes |\n");
            output.push_str("|------|-------|------------------|-----------------------|---------------------|\n");

            for metric in &self.recent {
                let p = &metric.performance;
                output.push_str(&format!(
                    "| {} | {:.2} | {:.2} | {:.2} | {} |\n",
                    p.date, p.level, p.daily_return_pct, p.cumulative_return_pct, metric.changes
                ));
            }
        }

        output
    }
}

impl fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Index Summary: {} ({} to {})",
            self.name, self.period_start, self.period_end
        )?;
        writeln!(
            f,
            "  Current Value: {:.2} ({:+.2}, {:+.2}%)",
            self.current_value, self.daily_change, self.daily_return_pct
        )?;
        writeln!(f, "  Cumulative Return: {:+.2}%", self.cumulative_return_pct)?;
        writeln!(f, "  Constituents: {}", self.constituent_count)?;
        writeln!(f, "  Composition Changes: {}", self.change_count)?;
        Ok(())
    }
}

/// Market cap share of one ticker, or of the `OTHERS` bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapSlice {
    /// Ticker, or [`OTHERS_LABEL`].
    pub label: String,

    /// Market cap in billions, rounded to one decimal.
    pub market_cap_billions: f64,
}

/// Largest members of a constituency by market cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapDistribution {
    /// Date of the constituency.
    pub date: NaiveDate,

    /// Top slices in rank order, followed by the `OTHERS` bucket if any
    /// member is left.
    pub slices: Vec<MarketCapSlice>,
}

fn billions(value: f64) -> f64 {
    (value / 1e9 * 10.0).round() / 10.0
}

impl MarketCapDistribution {
    /// Split `constituency` into its first `top_n` members and the rest.
    ///
    /// Members are taken in constituency (rank) order. Members without an
    /// entry in `caps` are left out.
    pub fn new(constituency: &IndexConstituency, caps: &[DailyMarketCap], top_n: usize) -> Self {
        let by_ticker: BTreeMap<&Ticker, f64> =
            caps.iter().map(|c| (&c.ticker, c.market_cap)).collect();

        let mut slices = Vec::with_capacity(top_n + 1);
        let mut others = 0.0;
        let mut has_others = false;

        for (i, ticker) in constituency.tickers.iter().enumerate() {
            let Some(&cap) = by_ticker.get(ticker) else {
                tracing::debug!(ticker = %ticker, "no market cap for distribution");
                continue;
            };
            if i < top_n {
                slices.push(MarketCapSlice {
                    label: ticker.to_string(),
                    market_cap_billions: billions(cap),
                });
            } else {
                others += cap;
                has_others = true;
            }
        }

        if has_others {
            slices.push(MarketCapSlice {
                label: OTHERS_LABEL.to_string(),
                market_cap_billions: billions(others),
            });
        }

        Self {
            date: constituency.date,
            slices,
        }
    }

    /// Sum of all slices in billions.
    pub fn total_billions(&self) -> f64 {
        self.slices.iter().map(|s| s.market_cap_billions).sum()
    }
}

impl fmt::Display for MarketCapDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Market Cap Distribution ({}), billions USD", self.date)?;
        let total = self.total_billions();
        for slice in &self.slices {
            let share = if total > 0.0 {
                slice.market_cap_billions / total * 100.0
            } else {
                0.0
            };
            writeln!(
                f,
                "  {:<10} {:>10.1} {:>6.1}%",
                slice.label, slice.market_cap_billions, share
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marketviz_index::{CompositionChange, IndexLevel};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn tickers(symbols: &[&str]) -> Vec<Ticker> {
        symbols.iter().map(|s| Ticker::new(*s)).collect()
    }

    fn series() -> IndexSeries {
        IndexSeries::from_parts(
            1000.0,
            vec![
                IndexLevel::new(date(3), 1000.0, 0.0),
                IndexLevel::new(date(4), 1020.0, 0.02),
                IndexLevel::new(date(5), 1050.0, 0.0294),
            ],
            vec![
                IndexConstituency::new(date(3), tickers(&["AAA", "BBB"])),
                IndexConstituency::new(date(4), tickers(&["AAA", "BBB"])),
                IndexConstituency::new(date(5), tickers(&["AAA", "CCC"])),
            ],
            vec![CompositionChange {
                date: date(5),
                added: tickers(&["CCC"]),
                removed: tickers(&["BBB"]),
            }],
        )
    }

    #[test]
    fn test_summary_from_series() {
        let summary = IndexSummary::from_series("Top 2", &series(), 2)
            .unwrap()
            .unwrap();

        assert_eq!(summary.period_start, date(3));
        assert_eq!(summary.period_end, date(5));
        assert_eq!(summary.current_value, 1050.0);
        assert_relative_eq!(summary.daily_change, 30.0, epsilon = 1e-9);
        assert_relative_eq!(summary.cumulative_return_pct, 5.0, epsilon = 1e-9);
        assert_eq!(summary.constituent_count, 2);
        assert_eq!(summary.change_count, 1);

        assert_eq!(summary.recent.len(), 2);
        assert_eq!(summary.recent[0].performance.date, date(5));
        assert_eq!(summary.recent[0].changes, "+(CCC) , -(BBB)");
        assert_eq!(summary.recent[1].changes, "-");
    }

    #[test]
    fn test_summary_of_empty_series() {
        let empty = IndexSeries::from_parts(1000.0, vec![], vec![], vec![]);
        assert!(IndexSummary::from_series("Empty", &empty, 30).unwrap().is_none());
    }

    #[test]
    fn test_summary_rendering() {
        let summary = IndexSummary::from_series("Top 2", &series(), 30)
            .unwrap()
            .unwrap();

        let ascii = summary.to_ascii_table();
        assert!(ascii.contains("Index Summary: Top 2"));
        assert!(ascii.contains("1050.00"));
        assert!(ascii.contains("+(CCC) , -(BBB)"));

        let markdown = summary.to_markdown();
        assert!(markdown.contains("# Index Summary: Top 2"));
        assert!(markdown.contains("| Date | Level |"));

        assert!(summary.to_string().contains("Constituents: 2"));
    }

    #[test]
    fn test_market_cap_distribution() {
        let constituency = IndexConstituency::new(date(5), tickers(&["AAA", "BBB", "CCC", "DDD"]));
        let caps = vec![
            DailyMarketCap::new(Ticker::new("AAA"), date(5), 100.0, 3.0e10),
            DailyMarketCap::new(Ticker::new("BBB"), date(5), 50.0, 4.0e10),
            DailyMarketCap::new(Ticker::new("CCC"), date(5), 10.0, 1.0e11),
            DailyMarketCap::new(Ticker::new("DDD"), date(5), 5.0, 5.0e10),
        ];

        let distribution = MarketCapDistribution::new(&constituency, &caps, 2);
        let labels: Vec<&str> = distribution.slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["AAA", "BBB", OTHERS_LABEL]);
        assert_relative_eq!(distribution.slices[0].market_cap_billions, 3000.0);
        assert_relative_eq!(distribution.slices[2].market_cap_billions, 1250.0);
        assert_relative_eq!(distribution.total_billions(), 6250.0);
    }

    #[test]
    fn test_distribution_without_others() {
        let constituency = IndexConstituency::new(date(5), tickers(&["AAA"]));
        let caps = vec![DailyMarketCap::new(Ticker::new("AAA"), date(5), 12.34, 1.0e9)];

        let distribution = MarketCapDistribution::new(&constituency, &caps, 5);
        assert_eq!(distribution.slices.len(), 1);
        assert_relative_eq!(distribution.slices[0].market_cap_billions, 12.3);
    }
}

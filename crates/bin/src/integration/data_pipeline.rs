//! Fetching of the per-ticker time series.
//!
//! Series are read from the store when it already covers the window and
//! fetched from Yahoo Finance otherwise, with a bounded number of requests in
//! flight. A ticker whose fetch fails is dropped with a warning; the pipeline
//! later reports it as a missing series.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use marketviz_data::{DataError, IndexStore, YahooSeriesFetcher};
use marketviz_index::{Ticker, TimeSeries};

/// Error type for data pipeline operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DataPipelineError {
    /// Data provider or store error.
    #[error("Data fetch error: {0}")]
    Fetch(#[from] DataError),
    /// Every ticker failed.
    #[error("no time series could be fetched for {0} tickers")]
    NothingFetched(usize),
}

/// Configuration for data fetching.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub use_cache: bool,
    /// Whether to force refresh (ignore cache).
    pub force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

impl FetchConfig {
    const fn reads_cache(&self) -> bool {
        self.use_cache && !self.force_refresh
    }
}

/// Default number of concurrent fetches.
pub(crate) const DEFAULT_CONCURRENCY: usize = 10;

/// Fetch the series of `tickers` over `[start, end]`, ordered by ticker.
///
/// Freshly fetched series are written back to `store` when caching is on.
pub(crate) async fn fetch_series_with_progress(
    fetcher: &YahooSeriesFetcher,
    tickers: &[Ticker],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    store: Option<&IndexStore>,
    config: FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<Vec<TimeSeries>, DataPipelineError> {
    let start_date = start.date_naive();
    let end_date = end.date_naive();

    let mut series = Vec::with_capacity(tickers.len());
    let mut to_fetch = Vec::new();

    match store {
        Some(store) if config.reads_cache() => {
            for ticker in tickers {
                match cached_series(store, ticker, start_date, end_date) {
                    Some(cached) => series.push(cached),
                    None => to_fetch.push(ticker.clone()),
                }
            }
        }
        _ => to_fetch.extend(tickers.iter().cloned()),
    }

    if let Some(pb) = progress {
        pb.set_length(tickers.len() as u64);
        pb.set_position(series.len() as u64);
        if to_fetch.is_empty() {
            pb.set_message("Loading from cache...");
        } else {
            pb.set_message(format!(
                "Fetching {} tickers ({} concurrent)...",
                to_fetch.len(),
                DEFAULT_CONCURRENCY
            ));
        }
    }
    tracing::info!(
        cached = series.len(),
        fetching = to_fetch.len(),
        "resolving time series"
    );

    let fetched: Vec<(Ticker, Result<TimeSeries, DataError>)> = stream::iter(to_fetch)
        .map(|ticker| async move {
            let result = fetcher.fetch_series(&ticker, start, end).await;
            if let Some(pb) = progress {
                pb.inc(1);
            }
            (ticker, result)
        })
        .buffer_unordered(DEFAULT_CONCURRENCY)
        .collect()
        .await;

    for (ticker, result) in fetched {
        match result {
            Ok(fetched) => {
                if config.use_cache
                    && let Some(store) = store
                    && let Err(e) = store.put_series(&fetched)
                {
                    tracing::warn!(ticker = %ticker, error = %e, "failed to cache series");
                }
                series.push(fetched);
            }
            Err(e) => {
                let warn = || tracing::warn!(ticker = %ticker, error = %e, "failed to fetch series");
                match progress {
                    Some(pb) => pb.suspend(warn),
                    None => warn(),
                }
            }
        }
    }

    if series.is_empty() && !tickers.is_empty() {
        return Err(DataPipelineError::NothingFetched(tickers.len()));
    }

    series.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(series)
}

fn cached_series(
    store: &IndexStore,
    ticker: &Ticker,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
) -> Option<TimeSeries> {
    match store.has_series(ticker, start, end) {
        Ok(true) => store.get_series(ticker, start, end).ok().flatten(),
        Ok(false) => None,
        Err(e) => {
            tracing::debug!(ticker = %ticker, error = %e, "cache lookup failed");
            None
        }
    }
}

//! MarketViz CLI binary.
//!
//! Builds the equal-weighted top-K index from live or CSV data, persists it
//! to SQLite and renders summaries of the stored index.

mod integration;

use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager::{open_store, print_store_info, resolve_db_path};
use integration::data_pipeline::{FetchConfig, fetch_series_with_progress};
use marketviz::universe::{LargeCapUniverse, TickerUniverse, Universe};
use marketviz_data::nasdaq::DEFAULT_FETCH_COUNT;
use marketviz_data::{CsvSource, DataError, NasdaqUniverseProvider, UniverseEntry, YahooSeriesFetcher};
use marketviz_index::{IndexConfig, IndexPipeline, IndexRun, IndexSeries, Ticker};
use marketviz_output::{ExportFormat, IndexExport, IndexSummary, MarketCapDistribution};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration as StdDuration;
use tracing_subscriber::EnvFilter;

/// Days before a requested date searched for a stored composition.
const COMPOSITION_LOOKBACK_DAYS: u32 = 5;

#[derive(Parser)]
#[command(name = "marketviz")]
#[command(about = "MarketViz: equal-weighted index of the top-K stocks by market cap", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database path (default: platform cache directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct IndexArgs {
    /// Calendar days of history ending at the latest price date
    #[arg(long)]
    lookback_days: Option<u32>,

    /// Number of constituents
    #[arg(long)]
    top_k: Option<usize>,

    /// Index level on the first date
    #[arg(long)]
    base_value: Option<f64>,

    /// JSON file with an index configuration; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch data, build the index and store it
    Build {
        #[command(flatten)]
        index: IndexArgs,

        /// Number of screener tickers to consider
        #[arg(long, default_value_t = DEFAULT_FETCH_COUNT)]
        fetch_count: usize,

        /// Read prices.csv, splits.csv and shares.csv from this directory
        /// instead of fetching
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Disable caching (always fetch fresh data)
        #[arg(long)]
        no_cache: bool,

        /// Force refresh cached data
        #[arg(long)]
        refresh: bool,

        /// Write performance, composition and change tables to this directory
        #[arg(long)]
        export: Option<PathBuf>,

        /// Export format (csv, json or pretty-json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Days shown in the recent metrics table
        #[arg(long, default_value_t = 30)]
        recent: usize,
    },

    /// Show the stored index
    Show {
        /// Composition date (default: latest)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Days shown in the recent metrics table
        #[arg(long, default_value_t = 30)]
        recent: usize,

        /// Tickers shown individually in the market cap distribution
        #[arg(long, default_value_t = 20)]
        top_n: usize,
    },

    /// List the candidate universe
    Universe {
        /// Number of screener tickers to list
        #[arg(long, default_value_t = DEFAULT_FETCH_COUNT)]
        fetch_count: usize,

        /// Use the built-in large-cap list instead of the Nasdaq screener
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marketviz=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Build {
            index,
            fetch_count,
            csv_dir,
            no_cache,
            refresh,
            export,
            format,
            recent,
        } => {
            let universe_limit = if csv_dir.is_some() {
                usize::MAX
            } else {
                fetch_count
            };
            let config = load_config(&index, universe_limit)?;
            let fetch = FetchConfig {
                use_cache: !no_cache,
                force_refresh: refresh,
            };
            let format: ExportFormat = format.parse()?;
            build_index(
                config,
                db,
                fetch_count,
                csv_dir.as_deref(),
                fetch,
                export.as_deref().map(|dir| (dir, format)),
                recent,
            )
            .await?;
        }
        Commands::Show { date, recent, top_n } => {
            show_index(db, date, recent, top_n)?;
        }
        Commands::Universe {
            fetch_count,
            offline,
        } => {
            list_universe(fetch_count, offline).await;
        }
    }

    Ok(())
}

/// Configuration from the optional JSON file, overridden by flags.
///
/// Validated against `universe_limit` before anything is fetched; the
/// pipeline checks `top_k` again against the universe actually resolved.
fn load_config(args: &IndexArgs, universe_limit: usize) -> Result<IndexConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<IndexConfig>(&raw)?
        }
        None => IndexConfig::default(),
    };

    if let Some(lookback_days) = args.lookback_days {
        config.lookback_days = lookback_days;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if let Some(base_value) = args.base_value {
        config.base_value = base_value;
    }

    config.validate(universe_limit)?;
    Ok(config)
}

fn index_name(top_k: usize) -> String {
    format!("MarketViz Top {}", top_k)
}

fn print_banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

async fn fetch_screener(limit: usize) -> Result<Vec<UniverseEntry>, DataError> {
    NasdaqUniverseProvider::new()?.fetch(limit).await
}

/// Screener tickers by current market cap, or the static list if the screener
/// is unavailable.
async fn resolve_universe(fetch_count: usize) -> Vec<Ticker> {
    universe_from_screener(fetch_screener(fetch_count).await, fetch_count)
}

fn universe_from_screener(
    screener: Result<Vec<UniverseEntry>, DataError>,
    fetch_count: usize,
) -> Vec<Ticker> {
    match screener {
        Ok(entries) if !entries.is_empty() => TickerUniverse::from_entries(&entries).tickers(),
        Ok(_) => {
            tracing::warn!("Nasdaq screener returned no rows, using built-in large-cap universe");
            LargeCapUniverse::new().take(fetch_count)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Nasdaq screener unavailable, using built-in large-cap universe");
            LargeCapUniverse::new().take(fetch_count)
        }
    }
}

async fn build_index(
    config: IndexConfig,
    db: Option<&Path>,
    fetch_count: usize,
    csv_dir: Option<&Path>,
    fetch: FetchConfig,
    export: Option<(&Path, ExportFormat)>,
    recent: usize,
) -> Result<(), Box<dyn Error>> {
    print_banner(&index_name(config.top_k).to_uppercase());

    let db_path = resolve_db_path(db);
    let store = open_store(&db_path)?;

    println!(
        "Configuration: top {} over {} days, base {:.2}",
        config.top_k, config.lookback_days, config.base_value
    );
    if fetch.use_cache {
        print_store_info(&store, &db_path);
        if fetch.force_refresh {
            println!("  Mode: Force refresh (re-fetching all data)");
        }
    } else {
        println!("  Cache: Disabled");
    }
    println!();

    let (universe, series) = match csv_dir {
        Some(dir) => {
            let source = CsvSource::new(dir);
            print!("Loading CSV data from {}...", dir.display());
            std::io::Write::flush(&mut std::io::stdout())?;
            let universe = source.tickers()?;
            let series = source.load()?;
            println!(" ✓ ({} series)", series.len());
            (universe, series)
        }
        None => {
            print!("Fetching universe ({} tickers)...", fetch_count);
            std::io::Write::flush(&mut std::io::stdout())?;
            let universe = resolve_universe(fetch_count).await;
            println!(" ✓ ({} tickers)", universe.len());

            let fetcher = YahooSeriesFetcher::new()?;
            let end = Utc::now();
            let start = end - Duration::days(i64::from(config.lookback_days));

            let pb = ProgressBar::new(universe.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("█▓░"),
            );
            pb.enable_steady_tick(StdDuration::from_millis(100));
            pb.set_message("Fetching time series...");

            let store_ref = fetch.use_cache.then_some(&store);
            match fetch_series_with_progress(
                &fetcher, &universe, start, end, store_ref, fetch, Some(&pb),
            )
            .await
            {
                Ok(series) => {
                    pb.finish_with_message(format!("Resolved {} series", series.len()));
                    (universe, series)
                }
                Err(e) => {
                    pb.finish_with_message("Failed!");
                    return Err(format!("Failed to fetch time series: {}", e).into());
                }
            }
        }
    };

    print!("Building index...");
    std::io::Write::flush(&mut std::io::stdout())?;
    let run = match IndexPipeline::new(config).run(&universe, &series) {
        Ok(run) => {
            println!(
                " ✓ ({} dates, {} composition changes)",
                run.series.levels().len(),
                run.series.changes().len()
            );
            run
        }
        Err(e) => {
            println!(" ✗");
            return Err(e.into());
        }
    };

    store.put_run(&run)?;
    println!("Saved index to {}", db_path.display());

    print_quality(&run);
    print_series(&index_name(run.config.top_k), &run.series, recent)?;

    if let Some(latest) = run.series.latest_constituency() {
        let caps = run.market_caps.ranked(latest.date);
        println!("{}", MarketCapDistribution::new(latest, caps, 20));
    }

    if let Some((dir, format)) = export {
        let paths = IndexExport::from_series(&run.series)?.write_to_dir(dir, format)?;
        println!("Exported:");
        for path in paths {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn print_quality(run: &IndexRun) {
    if run.events.is_empty() {
        return;
    }

    println!("\nData quality exclusions:");
    for (kind, count) in run.event_counts() {
        println!("  {:<22} {}", kind.to_string(), count);
    }
}

fn print_series(name: &str, series: &IndexSeries, recent: usize) -> Result<(), Box<dyn Error>> {
    match IndexSummary::from_series(name, series, recent)? {
        Some(summary) => print!("{}", summary.to_ascii_table()),
        None => println!("\nThe index has no levels."),
    }
    Ok(())
}

fn show_index(
    db: Option<&Path>,
    date: Option<NaiveDate>,
    recent: usize,
    top_n: usize,
) -> Result<(), Box<dyn Error>> {
    let db_path = resolve_db_path(db);
    let store = open_store(&db_path)?;

    let Some(series) = store.load_index()? else {
        return Err(format!(
            "no index stored in {}; run `marketviz build` first",
            db_path.display()
        )
        .into());
    };
    let config = store.config()?.unwrap_or_default();

    print_series(&index_name(config.top_k), &series, recent)?;

    let Some(requested) = date.or_else(|| series.latest().map(|l| l.date)) else {
        return Ok(());
    };

    match series.constituency_on_or_before(requested, COMPOSITION_LOOKBACK_DAYS) {
        Some(constituency) => {
            if constituency.date != requested {
                println!(
                    "\nNo data for {} (possible holiday), showing {} instead.",
                    requested, constituency.date
                );
            }
            println!("\nComposition on {} ({} members):", constituency.date, constituency.len());
            for (rank, ticker) in constituency.tickers.iter().enumerate() {
                println!("  {:>4}  {}", rank + 1, ticker);
            }
        }
        None => println!(
            "\nNo composition for {} or the previous {} days.",
            requested, COMPOSITION_LOOKBACK_DAYS
        ),
    }

    let change_dates = series.change_dates();
    if !change_dates.is_empty() {
        println!("\nComposition change dates:");
        for change_date in change_dates.iter().rev() {
            println!("  {}", change_date);
        }
    }

    if let Some(latest) = series.latest_constituency() {
        let caps = store.latest_market_caps()?;
        println!("\n{}", MarketCapDistribution::new(latest, &caps, top_n));
    }

    Ok(())
}

async fn list_universe(fetch_count: usize, offline: bool) {
    let entries = if offline {
        Vec::new()
    } else {
        match fetch_screener(fetch_count).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Nasdaq screener unavailable");
                Vec::new()
            }
        }
    };

    if entries.is_empty() {
        let universe = LargeCapUniverse::new();
        println!("\nBuilt-in large-cap universe ({} tickers):\n", universe.size());
        for (i, ticker) in universe.take(fetch_count).iter().enumerate() {
            println!("  {:>4}  {}", i + 1, ticker);
        }
        return;
    }

    println!("\nNasdaq screener by market cap ({} tickers):\n", entries.len());
    println!("  {:>4}  {:<8} {:>14}  {}", "Rank", "Ticker", "Mkt Cap ($B)", "Name");
    println!("  {}", "-".repeat(70));
    for (i, entry) in entries.iter().enumerate() {
        let cap = entry
            .market_cap
            .map_or_else(|| "-".to_string(), |c| format!("{:.1}", c / 1e9));
        println!(
            "  {:>4}  {:<8} {:>14}  {}",
            i + 1,
            entry.ticker.as_str(),
            cap,
            entry.name
        );
    }
}

//! Location of the SQLite store.
//!
//! The store doubles as the time-series cache of the fetcher and as the sink
//! of built indices, so `build` and `show` must agree on its path.

use marketviz_data::{DataError, IndexStore};
use std::path::{Path, PathBuf};

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/marketviz/`
/// - macOS: `~/Library/Caches/marketviz/`
/// - Windows: `%LOCALAPPDATA%\marketviz\cache\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("marketviz")
}

/// Get the default database path.
pub(crate) fn default_db_path() -> PathBuf {
    default_cache_dir().join("marketviz.db")
}

/// The `--db` override, or the default path.
pub(crate) fn resolve_db_path(db: Option<&Path>) -> PathBuf {
    db.map_or_else(default_db_path, Path::to_path_buf)
}

/// Open the store, creating the directory if needed.
pub(crate) fn open_store(path: &Path) -> Result<IndexStore, DataError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    IndexStore::open(path)
}

/// Print where the store lives and what it holds.
pub(crate) fn print_store_info(store: &IndexStore, path: &Path) {
    println!("  Store: {}", path.display());
    match store.stats() {
        Ok(stats) => println!(
            "  Cached: {} tickers, {} price rows; stored index: {} dates",
            stats.cached_tickers, stats.prices, stats.index_dates
        ),
        Err(e) => tracing::warn!(error = %e, "could not read store statistics"),
    }
}

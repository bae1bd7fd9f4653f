//! SQLite store for fetched time series and computed index results.

use crate::error::{DataError, Result};
use chrono::{NaiveDate, Utc};
use marketviz_index::{
    CompositionChange, DailyMarketCap, IndexConfig, IndexConstituency, IndexLevel, IndexRun,
    IndexSeries, PriceObservation, SharesSnapshot, SplitEvent, Ticker, TimeSeries,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Cached prices may start this many days after the requested start
/// (weekends and holidays have no prices).
const START_TOLERANCE_DAYS: i64 = 4;

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn split_tickers(joined: &str) -> Vec<Ticker> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(Ticker::new)
        .collect()
}

fn join_tickers(tickers: &[Ticker]) -> String {
    tickers
        .iter()
        .map(Ticker::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// SQLite store.
#[derive(Debug)]
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    /// Returns [`DataError::Database`] if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            );

            CREATE TABLE IF NOT EXISTS splits (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                ratio REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            );

            CREATE TABLE IF NOT EXISTS shares (
                ticker TEXT PRIMARY KEY,
                as_of TEXT NOT NULL,
                shares INTEGER NOT NULL,
                cached_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stocks (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                share_price REAL NOT NULL,
                market_cap REAL NOT NULL,
                effective_shares REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            );

            CREATE INDEX IF NOT EXISTS idx_stocks_date ON stocks(date);

            CREATE TABLE IF NOT EXISTS index_levels (
                date TEXT PRIMARY KEY,
                level REAL NOT NULL,
                daily_return REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS constituents (
                date TEXT NOT NULL,
                rank INTEGER NOT NULL,
                ticker TEXT NOT NULL,
                PRIMARY KEY (date, rank)
            );

            CREATE TABLE IF NOT EXISTS composition_changes (
                date TEXT PRIMARY KEY,
                added TEXT NOT NULL,
                removed TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Whether a cached series covers `[start, end]`.
    ///
    /// The last cached price must fall on `end` itself. A series that stops
    /// earlier would be missing on the newest dates of the window while
    /// freshly fetched tickers are not, so it is treated as absent.
    pub fn has_series(&self, ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> Result<bool> {
        let has_shares: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM shares WHERE ticker = ?1",
            params![ticker.as_str()],
            |row| row.get(0),
        )?;
        if !has_shares {
            return Ok(false);
        }

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM prices WHERE ticker = ?1 AND date >= ?2 AND date <= ?3",
            params![ticker.as_str(), date_text(start), date_text(end)],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Ok(false);
        }

        let (first, last) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM prices
             WHERE ticker = ?1 AND date >= ?2 AND date <= ?3",
            params![ticker.as_str(), date_text(start), date_text(end)],
            |row| Ok((date_at(row, 0)?, date_at(row, 1)?)),
        )?;

        Ok((first - start).num_days() <= START_TOLERANCE_DAYS && last >= end)
    }

    /// Cached series of `ticker` with prices restricted to `[start, end]`.
    ///
    /// All cached splits are returned.
    pub fn get_series(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<TimeSeries>> {
        let shares = self
            .conn
            .query_row(
                "SELECT as_of, shares FROM shares WHERE ticker = ?1",
                params![ticker.as_str()],
                |row| Ok((date_at(row, 0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((as_of, count)) = shares else {
            return Ok(None);
        };
        let count = u64::try_from(count)
            .map_err(|_| DataError::Parse(format!("negative shares for {}", ticker)))?;

        let mut stmt = self.conn.prepare(
            "SELECT date, close FROM prices
             WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;
        let prices = stmt
            .query_map(
                params![ticker.as_str(), date_text(start), date_text(end)],
                |row| Ok(PriceObservation::new(date_at(row, 0)?, row.get(1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT date, ratio FROM splits WHERE ticker = ?1 ORDER BY date ASC")?;
        let splits = stmt
            .query_map(params![ticker.as_str()], |row| {
                Ok(SplitEvent::new(date_at(row, 0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(TimeSeries::new(
            ticker.clone(),
            prices,
            splits,
            SharesSnapshot::new(as_of, count),
        )))
    }

    /// Store a fetched series, replacing rows on the same dates.
    pub fn put_series(&self, series: &TimeSeries) -> Result<()> {
        let shares = i64::try_from(series.shares.shares).map_err(|_| {
            DataError::Parse(format!("shares of {} exceed storage range", series.ticker))
        })?;
        let ticker = series.ticker.as_str();

        let tx = self.conn.unchecked_transaction()?;

        for price in &series.prices {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![ticker, date_text(price.date), price.close],
            )?;
        }

        for split in &series.splits {
            tx.execute(
                "INSERT OR REPLACE INTO splits (ticker, date, ratio) VALUES (?1, ?2, ?3)",
                params![ticker, date_text(split.date), split.ratio],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO shares (ticker, as_of, shares, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                ticker,
                date_text(series.shares.as_of),
                shares,
                Utc::now().to_rfc3339()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Replace the stored index with the result of `run`.
    pub fn put_run(&self, run: &IndexRun) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM stocks;
             DELETE FROM index_levels;
             DELETE FROM constituents;
             DELETE FROM composition_changes;
             DELETE FROM index_meta;",
        )?;

        for row in run.market_caps.iter() {
            tx.execute(
                "INSERT INTO stocks (ticker, date, share_price, market_cap, effective_shares)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.ticker.as_str(),
                    date_text(row.date),
                    row.close,
                    row.market_cap,
                    row.shares
                ],
            )?;
        }

        for level in run.series.levels() {
            tx.execute(
                "INSERT INTO index_levels (date, level, daily_return) VALUES (?1, ?2, ?3)",
                params![date_text(level.date), level.level, level.daily_return],
            )?;
        }

        for constituency in run.series.constituencies() {
            let date = date_text(constituency.date);
            for (rank, ticker) in constituency.tickers.iter().enumerate() {
                tx.execute(
                    "INSERT INTO constituents (date, rank, ticker) VALUES (?1, ?2, ?3)",
                    params![date, rank as i64 + 1, ticker.as_str()],
                )?;
            }
        }

        for change in run.series.changes() {
            tx.execute(
                "INSERT INTO composition_changes (date, added, removed) VALUES (?1, ?2, ?3)",
                params![
                    date_text(change.date),
                    join_tickers(&change.added),
                    join_tickers(&change.removed)
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO index_meta (key, value) VALUES ('config', ?1), ('computed_at', ?2)",
            params![serde_json::to_string(&run.config)?, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;

        tracing::info!(
            dates = run.series.levels().len(),
            rows = run.market_caps.len(),
            "stored index run"
        );
        Ok(())
    }

    /// Stored index levels, ascending by date.
    pub fn index_levels(&self) -> Result<Vec<IndexLevel>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, level, daily_return FROM index_levels ORDER BY date ASC")?;
        let levels = stmt
            .query_map([], |row| {
                Ok(IndexLevel::new(date_at(row, 0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(levels)
    }

    /// Stored constituency on `date`, in rank order.
    pub fn constituency(&self, date: NaiveDate) -> Result<Option<IndexConstituency>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ticker FROM constituents WHERE date = ?1 ORDER BY rank ASC")?;
        let tickers = stmt
            .query_map(params![date_text(date)], |row| {
                row.get::<_, String>(0).map(Ticker::new)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((!tickers.is_empty()).then(|| IndexConstituency::new(date, tickers)))
    }

    /// Every stored non-empty constituency, ascending by date.
    pub fn constituencies(&self) -> Result<Vec<IndexConstituency>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, ticker FROM constituents ORDER BY date ASC, rank ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((date_at(row, 0)?, Ticker::new(row.get::<_, String>(1)?)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut by_date: BTreeMap<NaiveDate, Vec<Ticker>> = BTreeMap::new();
        for (date, ticker) in rows {
            by_date.entry(date).or_default().push(ticker);
        }

        Ok(by_date
            .into_iter()
            .map(|(date, tickers)| IndexConstituency::new(date, tickers))
            .collect())
    }

    /// Stored composition changes, ascending by date.
    pub fn composition_changes(&self) -> Result<Vec<CompositionChange>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, added, removed FROM composition_changes ORDER BY date ASC")?;
        let changes = stmt
            .query_map([], |row| {
                Ok(CompositionChange {
                    date: date_at(row, 0)?,
                    added: split_tickers(&row.get::<_, String>(1)?),
                    removed: split_tickers(&row.get::<_, String>(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    /// Configuration of the stored run.
    pub fn config(&self) -> Result<Option<IndexConfig>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'config'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json).map_err(DataError::from))
            .transpose()
    }

    /// Rebuild the stored index series.
    ///
    /// Constituencies are keyed by the stored level dates, so a date with no
    /// `constituents` rows comes back as an empty constituency.
    ///
    /// Returns `None` when no index has been stored.
    pub fn load_index(&self) -> Result<Option<IndexSeries>> {
        let levels = self.index_levels()?;
        let Some(first) = levels.first() else {
            return Ok(None);
        };

        let base_value = match self.config()? {
            Some(config) => config.base_value,
            None => first.level,
        };

        let mut stored: BTreeMap<NaiveDate, IndexConstituency> = self
            .constituencies()?
            .into_iter()
            .map(|c| (c.date, c))
            .collect();
        let constituencies = levels
            .iter()
            .map(|level| {
                stored
                    .remove(&level.date)
                    .unwrap_or_else(|| IndexConstituency::new(level.date, Vec::new()))
            })
            .collect();

        Ok(Some(IndexSeries::from_parts(
            base_value,
            levels,
            constituencies,
            self.composition_changes()?,
        )))
    }

    /// Stored market caps on `date`, largest first.
    pub fn market_caps_on(&self, date: NaiveDate) -> Result<Vec<DailyMarketCap>> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker, date, share_price, effective_shares FROM stocks
             WHERE date = ?1
             ORDER BY market_cap DESC, ticker ASC",
        )?;
        let rows = stmt
            .query_map(params![date_text(date)], Self::market_cap_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent stored market cap of every ticker, largest first.
    pub fn latest_market_caps(&self) -> Result<Vec<DailyMarketCap>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.ticker, s.date, s.share_price, s.effective_shares
             FROM stocks s
             JOIN (SELECT ticker, MAX(date) AS date FROM stocks GROUP BY ticker) latest
               ON s.ticker = latest.ticker AND s.date = latest.date
             ORDER BY s.market_cap DESC, s.ticker ASC",
        )?;
        let rows = stmt
            .query_map([], Self::market_cap_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn market_cap_row(row: &Row<'_>) -> rusqlite::Result<DailyMarketCap> {
        Ok(DailyMarketCap::new(
            Ticker::new(row.get::<_, String>(0)?),
            date_at(row, 1)?,
            row.get(2)?,
            row.get(3)?,
        ))
    }

    /// Delete everything.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM prices;
             DELETE FROM splits;
             DELETE FROM shares;
             DELETE FROM stocks;
             DELETE FROM index_levels;
             DELETE FROM constituents;
             DELETE FROM composition_changes;
             DELETE FROM index_meta;",
        )?;
        Ok(())
    }

    /// Delete the cached series of one ticker.
    pub fn clear_ticker(&self, ticker: &Ticker) -> Result<()> {
        for table in ["prices", "splits", "shares"] {
            self.conn.execute(
                &format!("DELETE FROM {} WHERE ticker = ?1", table),
                params![ticker.as_str()],
            )?;
        }
        Ok(())
    }

    /// Row counts.
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };

        Ok(StoreStats {
            prices: count("SELECT COUNT(*) FROM prices")?,
            splits: count("SELECT COUNT(*) FROM splits")?,
            cached_tickers: count("SELECT COUNT(*) FROM shares")?,
            market_cap_rows: count("SELECT COUNT(*) FROM stocks")?,
            index_dates: count("SELECT COUNT(*) FROM index_levels")?,
            composition_changes: count("SELECT COUNT(*) FROM composition_changes")?,
        })
    }
}

/// Store row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Cached price rows
    pub prices: usize,
    /// Cached split rows
    pub splits: usize,
    /// Tickers with a cached shares snapshot
    pub cached_tickers: usize,
    /// Stored market cap rows
    pub market_cap_rows: usize,
    /// Stored index dates
    pub index_dates: usize,
    /// Stored composition changes
    pub composition_changes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketviz_index::IndexPipeline;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn series(ticker: &str, closes: &[(u32, f64)], splits: Vec<SplitEvent>) -> TimeSeries {
        TimeSeries::new(
            Ticker::new(ticker),
            closes
                .iter()
                .map(|&(d, c)| PriceObservation::new(date(d), c))
                .collect(),
            splits,
            SharesSnapshot::new(date(14), 1_000),
        )
    }

    fn sample_run() -> IndexRun {
        let all = vec![
            series("A", &[(10, 100.0), (11, 110.0), (12, 111.0)], vec![]),
            series("B", &[(10, 90.0), (11, 85.0), (12, 86.0)], vec![]),
            series("C", &[(10, 80.0), (11, 95.0), (12, 96.0)], vec![]),
        ];
        let config = IndexConfig {
            top_k: 2,
            ..IndexConfig::default()
        };
        let universe: Vec<Ticker> = ["A", "B", "C"].into_iter().map(Ticker::new).collect();
        IndexPipeline::new(config).run(&universe, &all).unwrap()
    }

    #[test]
    fn test_store_initialization() {
        let store = IndexStore::in_memory().unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.prices, 0);
        assert_eq!(stats.index_dates, 0);
        assert!(store.load_index().unwrap().is_none());
    }

    #[test]
    fn test_series_round_trip() {
        let store = IndexStore::in_memory().unwrap();
        let original = series(
            "NVDA",
            &[(3, 1200.0), (7, 1210.0), (10, 121.0), (12, 125.0)],
            vec![SplitEvent::new(date(10), 10.0)],
        );
        store.put_series(&original).unwrap();

        let loaded = store
            .get_series(&Ticker::new("NVDA"), date(1), date(14))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, original);

        let trimmed = store
            .get_series(&Ticker::new("NVDA"), date(7), date(10))
            .unwrap()
            .unwrap();
        assert_eq!(trimmed.prices.len(), 2);
        assert_eq!(trimmed.splits.len(), 1);

        assert!(store.get_series(&Ticker::new("AAPL"), date(1), date(14)).unwrap().is_none());
    }

    #[test]
    fn test_has_series() {
        let store = IndexStore::in_memory().unwrap();
        store
            .put_series(&series("A", &[(3, 1.0), (7, 1.0), (12, 1.0)], vec![]))
            .unwrap();
        let ticker = Ticker::new("A");

        assert!(store.has_series(&ticker, date(3), date(12)).unwrap());
        assert!(store.has_series(&ticker, date(1), date(7)).unwrap());
        assert!(!store.has_series(&ticker, date(3), date(13)).unwrap());
        assert!(!store.has_series(&ticker, date(3), date(20)).unwrap());
        assert!(!store.has_series(&ticker, date(1), date(2)).unwrap());
        assert!(!store.has_series(&Ticker::new("B"), date(3), date(12)).unwrap());
    }

    #[test]
    fn test_run_round_trip() {
        let store = IndexStore::in_memory().unwrap();
        let run = sample_run();
        store.put_run(&run).unwrap();

        let loaded = store.load_index().unwrap().unwrap();
        assert_eq!(loaded.levels(), run.series.levels());
        assert_eq!(loaded.constituencies(), run.series.constituencies());
        assert_eq!(loaded.changes(), run.series.changes());
        assert_eq!(store.config().unwrap(), Some(run.config.clone()));

        let change = &store.composition_changes().unwrap()[0];
        assert_eq!(change.added, vec![Ticker::new("C")]);
        assert_eq!(change.removed, vec![Ticker::new("B")]);
    }

    #[test]
    fn test_empty_constituency_survives_round_trip() {
        let store = IndexStore::in_memory().unwrap();
        let mut run = sample_run();
        let a = || vec![Ticker::new("A")];
        run.series = IndexSeries::from_parts(
            1000.0,
            vec![
                IndexLevel::new(date(10), 1000.0, 0.0),
                IndexLevel::new(date(11), 1000.0, 0.0),
                IndexLevel::new(date(12), 1000.0, 0.0),
            ],
            vec![
                IndexConstituency::new(date(10), a()),
                IndexConstituency::new(date(11), Vec::new()),
                IndexConstituency::new(date(12), a()),
            ],
            Vec::new(),
        );
        store.put_run(&run).unwrap();

        let loaded = store.load_index().unwrap().unwrap();
        assert_eq!(loaded.constituencies(), run.series.constituencies());
        assert!(loaded.constituency(date(11)).unwrap().is_empty());
        assert!(store.constituency(date(11)).unwrap().is_none());
    }

    #[test]
    fn test_put_run_replaces_previous() {
        let store = IndexStore::in_memory().unwrap();
        let run = sample_run();
        store.put_run(&run).unwrap();
        store.put_run(&run).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.index_dates, 3);
        assert_eq!(stats.market_cap_rows, 9);
    }

    #[test]
    fn test_constituency_and_market_caps() {
        let store = IndexStore::in_memory().unwrap();
        store.put_run(&sample_run()).unwrap();

        let top = store.constituency(date(11)).unwrap().unwrap();
        assert_eq!(top.tickers, vec![Ticker::new("A"), Ticker::new("C")]);
        assert!(store.constituency(date(1)).unwrap().is_none());

        let latest = store.latest_market_caps().unwrap();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].ticker, Ticker::new("A"));
        assert_eq!(latest[0].date, date(12));
        assert_eq!(latest[0].market_cap, 111_000.0);

        assert_eq!(store.market_caps_on(date(10)).unwrap().len(), 3);
    }

    #[test]
    fn test_clear_ticker() {
        let store = IndexStore::in_memory().unwrap();
        store.put_series(&series("A", &[(3, 1.0)], vec![])).unwrap();
        store.put_series(&series("B", &[(3, 1.0)], vec![])).unwrap();

        store.clear_ticker(&Ticker::new("A")).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.cached_tickers, 1);
        assert_eq!(stats.prices, 1);

        store.clear_all().unwrap();
        assert_eq!(store.stats().unwrap().cached_tickers, 0);
    }
}

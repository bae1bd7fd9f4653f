//! Offline data path: CSV series through the index pipeline into the store.

use chrono::NaiveDate;
use marketviz_data::{CsvSource, IndexStore};
use marketviz_index::{IndexConfig, IndexPipeline, Ticker};

const PRICES: &str = "ticker,date,close
AAA,2024-06-03,100
AAA,2024-06-04,110
AAA,2024-06-05,121
BBB,2024-06-03,45
BBB,2024-06-04,42.5
BBB,2024-06-05,43
CCC,2024-06-03,400
CCC,2024-06-04,190
CCC,2024-06-05,200
";

// CCC split 2-for-1 on the 4th; its market cap only looks halved in raw closes.
const SPLITS: &str = "ticker,date,ratio
CCC,2024-06-04,2
";

const SHARES: &str = "ticker,as_of,shares
AAA,2024-06-05,1000
BBB,2024-06-05,2000
CCC,2024-06-05,500
";

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

#[test]
fn test_csv_to_store() {
    let series =
        CsvSource::from_readers(PRICES.as_bytes(), Some(SPLITS.as_bytes()), SHARES.as_bytes())
            .unwrap();
    let universe: Vec<Ticker> = series.iter().map(|s| s.ticker.clone()).collect();

    let store = IndexStore::in_memory().unwrap();
    for s in &series {
        store.put_series(s).unwrap();
    }

    let config = IndexConfig {
        top_k: 2,
        lookback_days: 10,
        ..IndexConfig::default()
    };
    let run = IndexPipeline::new(config).run(&universe, &series).unwrap();

    // Day 3 caps: AAA 100k, BBB 90k, CCC 400 * 250 = 100k (tie broken by ticker).
    assert_eq!(
        run.series.constituency(date(3)).unwrap().tickers,
        vec![Ticker::new("AAA"), Ticker::new("CCC")]
    );
    let ccc = Ticker::new("CCC");
    assert_eq!(run.market_cap(&ccc, date(4)).unwrap().market_cap, 95_000.0);
    assert!(run.events.is_empty());

    store.put_run(&run).unwrap();
    let stored = store.load_index().unwrap().unwrap();
    assert_eq!(stored.levels(), run.series.levels());
    assert_eq!(stored.changes(), run.series.changes());

    let cached = store.get_series(&ccc, date(1), date(30)).unwrap().unwrap();
    assert_eq!(cached.splits.len(), 1);
    assert!(store.has_series(&ccc, date(3), date(5)).unwrap());
}

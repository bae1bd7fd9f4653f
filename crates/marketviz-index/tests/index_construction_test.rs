//! End-to-end tests for the index pipeline.

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use marketviz_index::{
    DataQualityKind, IndexConfig, IndexPipeline, PriceObservation, SharesSnapshot, SplitEvent,
    Ticker, TimeSeries,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 1).unwrap() + Duration::days(offset)
}

fn tickers(symbols: &[&str]) -> Vec<Ticker> {
    symbols.iter().map(|s| Ticker::new(*s)).collect()
}

/// One share each, so the close is the market cap.
fn unit_series(ticker: &str, closes: &[f64]) -> TimeSeries {
    TimeSeries::new(
        Ticker::new(ticker),
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceObservation::new(day(i as i64), c))
            .collect(),
        vec![],
        SharesSnapshot::new(day(closes.len() as i64 - 1), 1),
    )
}

fn config(top_k: usize) -> IndexConfig {
    IndexConfig {
        top_k,
        ..IndexConfig::default()
    }
}

#[test]
fn test_overtake_changes_composition() {
    let series = vec![
        unit_series("A", &[100.0, 110.0]),
        unit_series("B", &[90.0, 85.0]),
        unit_series("C", &[80.0, 95.0]),
        unit_series("D", &[70.0, 70.0]),
    ];

    let run = IndexPipeline::new(config(2))
        .run(&tickers(&["A", "B", "C", "D"]), &series)
        .unwrap();
    let index = &run.series;

    assert_eq!(index.constituency(day(0)).unwrap().tickers, tickers(&["A", "B"]));
    assert_eq!(index.constituency(day(1)).unwrap().tickers, tickers(&["A", "C"]));

    let change = index.change(day(1)).unwrap();
    assert_eq!(change.added, tickers(&["C"]));
    assert_eq!(change.removed, tickers(&["B"]));
    assert!(index.change(day(0)).is_none());

    // Only A continues: (110 / 100 - 1) / 2
    let level = index.level(day(1)).unwrap();
    assert_relative_eq!(level.daily_return, 0.05, epsilon = 1e-12);
    assert_relative_eq!(level.level, 1050.0, epsilon = 1e-9);
    assert!(run.events.is_empty());
}

#[test]
fn test_split_keeps_market_cap_continuous() {
    // 2-for-1 on day 2: the price halves, the share count doubles.
    let split = TimeSeries::new(
        Ticker::new("NVDA"),
        vec![
            PriceObservation::new(day(0), 100.0),
            PriceObservation::new(day(1), 100.0),
            PriceObservation::new(day(2), 50.0),
            PriceObservation::new(day(3), 50.0),
        ],
        vec![SplitEvent::new(day(2), 2.0)],
        SharesSnapshot::new(day(3), 2_000),
    );
    let flat = unit_series("AAPL", &[1.0, 1.0, 1.0, 1.0]);

    let run = IndexPipeline::new(config(2))
        .run(&tickers(&["NVDA", "AAPL"]), &[split, flat])
        .unwrap();

    let nvda = Ticker::new("NVDA");
    assert_relative_eq!(run.shares.get(&nvda, day(1)).unwrap(), 1_000.0);
    assert_relative_eq!(run.shares.get(&nvda, day(2)).unwrap(), 2_000.0);

    for offset in 0..4 {
        assert_relative_eq!(run.market_cap(&nvda, day(offset)).unwrap().market_cap, 100_000.0);
    }
}

#[test]
fn test_split_day_return_uses_raw_closes() {
    // Closes are not split-adjusted, so the split day shows the raw move.
    let split = TimeSeries::new(
        Ticker::new("X"),
        vec![
            PriceObservation::new(day(0), 100.0),
            PriceObservation::new(day(1), 50.0),
        ],
        vec![SplitEvent::new(day(1), 2.0)],
        SharesSnapshot::new(day(1), 10),
    );

    let run = IndexPipeline::new(config(1))
        .run(&tickers(&["X"]), &[split])
        .unwrap();
    assert_relative_eq!(run.series.levels()[1].daily_return, -0.5, epsilon = 1e-12);
}

#[test]
fn test_invalid_split_excludes_only_crossing_dates() {
    let broken = TimeSeries::new(
        Ticker::new("BRK"),
        (0..4).map(|i| PriceObservation::new(day(i), 500.0)).collect(),
        vec![SplitEvent::new(day(2), 0.0)],
        SharesSnapshot::new(day(3), 1_000),
    );
    let healthy = unit_series("OK", &[1.0, 1.0, 1.0, 1.0]);

    let run = IndexPipeline::new(config(2))
        .run(&tickers(&["BRK", "OK"]), &[broken, healthy])
        .unwrap();

    assert!(!run.series.constituency(day(1)).unwrap().contains("BRK"));
    assert!(run.series.constituency(day(2)).unwrap().contains("BRK"));
    assert_eq!(run.event_count(DataQualityKind::IntegrityFailure), 1);
    assert_eq!(run.shares.failures()[0].to, day(1));
}

#[test]
fn test_constituency_size_is_min_of_k_and_available() {
    let mut rng = StdRng::seed_from_u64(7);
    let symbols: Vec<String> = (0..25).map(|i| format!("T{:02}", i)).collect();
    let days = 12;

    let series: Vec<TimeSeries> = symbols
        .iter()
        .map(|symbol| {
            let mut prices = Vec::new();
            for i in 0..days {
                if rng.gen_bool(0.8) {
                    prices.push(PriceObservation::new(day(i), rng.gen_range(1.0..500.0)));
                }
            }
            TimeSeries::new(
                Ticker::new(symbol.as_str()),
                prices,
                vec![],
                SharesSnapshot::new(day(days - 1), rng.gen_range(1_000..1_000_000)),
            )
        })
        .collect();
    let universe: Vec<Ticker> = symbols.iter().map(|s| Ticker::new(s.as_str())).collect();

    for top_k in [1, 5, 10, 25] {
        let run = IndexPipeline::new(config(top_k)).run(&universe, &series).unwrap();

        for constituency in run.series.constituencies() {
            let available = run.market_caps.ranked(constituency.date);
            assert_eq!(constituency.len(), top_k.min(available.len()));

            let caps: Vec<f64> = constituency
                .tickers
                .iter()
                .map(|t| run.market_cap(t, constituency.date).unwrap().market_cap)
                .collect();
            assert!(caps.windows(2).all(|w| w[0] >= w[1]));

            // No excluded ticker beats the smallest member.
            if let Some(&smallest) = caps.last() {
                assert!(
                    available
                        .iter()
                        .filter(|row| !constituency.tickers.contains(&row.ticker))
                        .all(|row| row.market_cap <= smallest)
                );
            }
        }

        assert!(run.series.is_consistent(1e-9));
    }
}

#[test]
fn test_levels_round_trip_from_returns() {
    let mut rng = StdRng::seed_from_u64(42);
    let series: Vec<TimeSeries> = ["A", "B", "C", "D", "E"]
        .iter()
        .map(|symbol| {
            let closes: Vec<f64> = (0..20).map(|_| rng.gen_range(50.0..150.0)).collect();
            unit_series(symbol, &closes)
        })
        .collect();

    let run = IndexPipeline::new(config(3))
        .run(&tickers(&["A", "B", "C", "D", "E"]), &series)
        .unwrap();

    let recomputed = run.series.recompute_levels();
    assert_eq!(recomputed.len(), run.series.levels().len());
    for (value, stored) in recomputed.iter().zip(run.series.levels()) {
        assert_relative_eq!(*value, stored.level, max_relative = 1e-12);
    }
}

#[test]
fn test_changes_match_constituency_differences() {
    let mut rng = StdRng::seed_from_u64(3);
    let symbols = ["A", "B", "C", "D", "E", "F"];
    let series: Vec<TimeSeries> = symbols
        .iter()
        .map(|symbol| {
            let closes: Vec<f64> = (0..15).map(|_| rng.gen_range(10.0..20.0)).collect();
            unit_series(symbol, &closes)
        })
        .collect();

    let run = IndexPipeline::new(config(3))
        .run(&tickers(&symbols), &series)
        .unwrap();
    let index = &run.series;

    for pair in index.constituencies().windows(2) {
        let (before, after) = (pair[0].as_set(), pair[1].as_set());
        match index.change(pair[1].date) {
            Some(change) => {
                assert!(change.added.iter().all(|t| after.contains(t) && !before.contains(t)));
                assert!(change.removed.iter().all(|t| before.contains(t) && !after.contains(t)));
                assert_eq!(change.turnover(), before.symmetric_difference(&after).count());
            }
            None => assert_eq!(before, after),
        }
    }
}

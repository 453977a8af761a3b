//! Property tests for cleaning invariants.
//!
//! 1. Column-name normalization is idempotent
//! 2. Output ROI lies within the configured bounds
//! 3. Output market value never exceeds the cap computed during the run
//! 4. Output rows are dated on or after the cutoff and carry no nulls

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use proptest::prelude::*;

use portfolio_cleaner::data::DataProcessor;
use portfolio_cleaner::{clean, CleaningConfig, FixedClock};

// ── Strategies (proptest) ────────────────────────────────────────────

/// (roi, market_value, units_held, day offset from 2020-01-01, asset type index)
fn arb_row() -> impl Strategy<Value = (f64, f64, f64, i64, usize)> {
    (
        -5.0..5.0_f64,
        0.0..1_000_000.0_f64,
        0.0..500.0_f64,
        -1500_i64..1500,
        0_usize..4,
    )
}

fn frame(rows: &[(f64, f64, f64, i64, usize)]) -> DataFrame {
    const TYPES: [&str; 4] = ["Stock", "ETF", "MutualFund", "bond"];
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

    let roi: Vec<f64> = rows.iter().map(|r| r.0).collect();
    let market: Vec<f64> = rows.iter().map(|r| r.1).collect();
    let units: Vec<f64> = rows.iter().map(|r| r.2).collect();
    let dates: Vec<String> = rows
        .iter()
        .map(|r| (base + Duration::days(r.3)).format("%Y-%m-%d").to_string())
        .collect();
    let types: Vec<&str> = rows.iter().map(|r| TYPES[r.4]).collect();
    let prices: Vec<f64> = vec![10.0; rows.len()];

    df!(
        "ROI" => roi,
        "Market Value" => market,
        "Units Held" => units,
        "Unit Price" => prices,
        "Date" => dates,
        "Asset Type" => types
    )
    .unwrap()
}

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
}

proptest! {
    #[test]
    fn column_name_normalization_is_idempotent(name in "[ A-Za-z_]{0,24}") {
        let once = DataProcessor::normalize_column_name(&name);
        let twice = DataProcessor::normalize_column_name(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn roi_stays_within_bounds(rows in prop::collection::vec(arb_row(), 1..40)) {
        let (out, _) = clean(frame(&rows), &CleaningConfig::default(), &clock()).unwrap();
        for v in out.column("roi").unwrap().f64().unwrap() {
            let v = v.unwrap();
            prop_assert!((-1.0..=1.0).contains(&v), "roi {} out of bounds", v);
        }
    }

    #[test]
    fn market_value_never_exceeds_cap(rows in prop::collection::vec(arb_row(), 1..40)) {
        let (out, report) = clean(frame(&rows), &CleaningConfig::default(), &clock()).unwrap();
        let cap = report.market_value_cap.unwrap();
        for v in out.column("market_value").unwrap().f64().unwrap() {
            prop_assert!(v.unwrap() <= cap);
        }
    }

    #[test]
    fn retained_rows_are_dated_and_complete(rows in prop::collection::vec(arb_row(), 1..40)) {
        let (out, report) = clean(frame(&rows), &CleaningConfig::default(), &clock()).unwrap();

        let dates = out.column("date").unwrap().cast(&DataType::String).unwrap();
        for d in dates.str().unwrap().into_iter() {
            let d = d.unwrap();
            prop_assert!(d >= "2020-01-01", "{} before cutoff", d);
        }
        prop_assert!(report.nulls_after.iter().all(|n| n.nulls == 0));
        prop_assert!(out.column("recalculated_value").is_err());
        prop_assert!(out.column("value_diff").is_err());
    }
}

//! Cleaning pipeline: a fixed, ordered list of named steps over one table.
//!
//! [`clean`] runs every step in [`STEPS`] on an in-memory table;
//! [`run`] wraps it with loading and saving.

use polars::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::{CleaningConfig, ConfigError};
use crate::data::{DataLoader, DataProcessor, LoaderError, ProcessorError, REQUIRED_COLUMNS};
use crate::stats::{ColumnNulls, ColumnType, StatsCalculator};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// What a run observed. Advisory only; the output table is the contract.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rows_in: usize,
    pub rows_after_dedup: usize,
    pub rows_out: usize,
    pub nulls_before: Vec<ColumnNulls>,
    pub nulls_after: Vec<ColumnNulls>,
    pub dtypes: Vec<ColumnType>,
    /// Cap applied to `market_value`; `None` for an empty table.
    pub market_value_cap: Option<f64>,
    /// Rows where `market_value != units_held * unit_price`.
    pub value_mismatches: usize,
}

/// State shared by the steps of one run.
pub struct StepContext<'a> {
    pub config: &'a CleaningConfig,
    pub clock: &'a dyn Clock,
    pub report: RunReport,
}

pub type StepFn = fn(DataFrame, &mut StepContext<'_>) -> Result<DataFrame, ProcessorError>;

/// A named transformation.
pub struct Step {
    pub name: &'static str,
    pub apply: StepFn,
}

/// Steps in execution order.
pub const STEPS: &[Step] = &[
    Step { name: "normalize_column_names", apply: normalize_column_names },
    Step { name: "check_required_columns", apply: check_required_columns },
    Step { name: "report_missing_values", apply: report_missing_values },
    Step { name: "impute_text_columns", apply: impute_text_columns },
    Step { name: "impute_numeric_columns", apply: impute_numeric_columns },
    Step { name: "parse_dates", apply: parse_dates },
    Step { name: "drop_duplicates", apply: drop_duplicates },
    Step { name: "recompute_market_value", apply: recompute_market_value },
    Step { name: "cap_market_value", apply: cap_market_value },
    Step { name: "clip_roi", apply: clip_roi },
    Step { name: "filter_by_date", apply: filter_by_date },
    Step { name: "normalize_asset_type", apply: normalize_asset_type },
    Step { name: "derive_features", apply: derive_features },
    Step { name: "drop_diagnostic_columns", apply: drop_diagnostic_columns },
    Step { name: "final_report", apply: final_report },
];

/// Apply every step in order to `df`. The config is validated first.
pub fn clean(
    mut df: DataFrame,
    config: &CleaningConfig,
    clock: &dyn Clock,
) -> Result<(DataFrame, RunReport), PipelineError> {
    config.validate()?;

    let mut ctx = StepContext {
        config,
        clock,
        report: RunReport {
            rows_in: df.height(),
            ..Default::default()
        },
    };

    for step in STEPS {
        df = (step.apply)(df, &mut ctx)?;
        debug!(step = step.name, rows = df.height(), columns = df.width(), "step done");
    }

    ctx.report.rows_out = df.height();
    Ok((df, ctx.report))
}

/// Load `input`, clean it and write the result to `output`.
pub fn run(
    input: &Path,
    output: &Path,
    config: &CleaningConfig,
    clock: &dyn Clock,
) -> Result<RunReport, PipelineError> {
    config.validate()?;

    let raw = DataLoader::load_csv(input)?;
    if config.preview_rows > 0 {
        info!("First rows of raw data:\n{}", DataLoader::preview(&raw, config.preview_rows));
    }

    let (cleaned, report) = clean(raw, config, clock)?;
    DataLoader::save_csv(&cleaned, output)?;

    info!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        "cleaned dataset saved as {}",
        output.display()
    );
    Ok(report)
}

fn normalize_column_names(df: DataFrame, _: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::normalize_column_names(df)
}

fn check_required_columns(df: DataFrame, _: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::check_required_columns(&df, &REQUIRED_COLUMNS)?;
    Ok(df)
}

fn report_missing_values(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    let nulls = StatsCalculator::null_counts(&df);
    info!("Missing values before cleaning:\n{}", format_nulls(&nulls));
    ctx.report.nulls_before = nulls;
    Ok(df)
}

fn impute_text_columns(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::impute_text_columns(df, &ctx.config.text_columns, &ctx.config.text_fill)
}

fn impute_numeric_columns(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::impute_numeric_columns(df, &ctx.config.numeric_columns, ctx.config.numeric_fill)
}

fn parse_dates(df: DataFrame, _: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::parse_dates(df)
}

fn drop_duplicates(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    let df = DataProcessor::drop_duplicates(df)?;
    ctx.report.rows_after_dedup = df.height();
    Ok(df)
}

fn recompute_market_value(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    let (df, mismatches) = DataProcessor::recompute_market_value(df)?;
    if mismatches > 0 {
        info!(rows = mismatches, "market_value differs from units_held * unit_price");
    }
    ctx.report.value_mismatches = mismatches;
    Ok(df)
}

fn cap_market_value(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    let (df, cap) = DataProcessor::cap_market_value(df, ctx.config.market_value_quantile)?;
    ctx.report.market_value_cap = cap;
    Ok(df)
}

fn clip_roi(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::clip_roi(df, ctx.config.roi_min, ctx.config.roi_max)
}

fn filter_by_date(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::filter_by_date(df, ctx.config.min_date)
}

fn normalize_asset_type(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::normalize_asset_type(df, &ctx.config.asset_type_synonyms)
}

fn derive_features(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::derive_features(df, ctx.clock.today())
}

fn drop_diagnostic_columns(df: DataFrame, _: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    DataProcessor::drop_diagnostic_columns(df)
}

fn final_report(df: DataFrame, ctx: &mut StepContext<'_>) -> Result<DataFrame, ProcessorError> {
    let nulls = StatsCalculator::null_counts(&df);
    let dtypes = StatsCalculator::dtypes(&df);
    info!("Missing values after cleaning:\n{}", format_nulls(&nulls));
    info!(
        "Data types:\n{}",
        dtypes
            .iter()
            .map(|t| format!("{:<20} {}", t.column, t.dtype))
            .collect::<Vec<_>>()
            .join("\n")
    );
    ctx.report.nulls_after = nulls;
    ctx.report.dtypes = dtypes;
    Ok(df)
}

fn format_nulls(nulls: &[ColumnNulls]) -> String {
    nulls
        .iter()
        .map(|n| format!("{:<20} {}", n.column, n.nulls))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn today() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    #[test]
    fn steps_run_in_documented_order() {
        let names: Vec<&str> = STEPS.iter().map(|s| s.name).collect();
        let pos = |n: &str| names.iter().position(|s| *s == n).unwrap();
        assert_eq!(pos("normalize_column_names"), 0);
        assert!(pos("check_required_columns") < pos("impute_text_columns"));
        assert!(pos("impute_numeric_columns") < pos("drop_duplicates"));
        assert!(pos("drop_duplicates") < pos("cap_market_value"));
        assert!(pos("cap_market_value") < pos("clip_roi"));
        assert!(pos("clip_roi") < pos("filter_by_date"));
        assert!(pos("filter_by_date") < pos("normalize_asset_type"));
        assert!(pos("derive_features") < pos("drop_diagnostic_columns"));
    }

    #[test]
    fn missing_required_columns_fail_before_any_cleaning() {
        let df = df!("Account" => ["a"], "ROI" => [0.5]).unwrap();
        let err = clean(df, &CleaningConfig::default(), &today()).unwrap_err();
        match err {
            PipelineError::Processor(ProcessorError::MissingColumns(missing)) => {
                assert_eq!(
                    missing,
                    vec!["date", "units_held", "unit_price", "market_value", "asset_type"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_rejects_inverted_roi_bounds() {
        let df = df!("roi" => [0.5]).unwrap();
        let config = CleaningConfig {
            roi_min: 1.0,
            roi_max: -1.0,
            ..Default::default()
        };
        let err = clean(df, &config, &today()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn clean_rejects_quantile_above_one() {
        let df = df!(
            "asset_type" => ["stock", "etf", "bond"],
            "units_held" => [1.0, 2.0, 3.0],
            "unit_price" => [1.0, 1.0, 1.0],
            "market_value" => [1.0, 2.0, 3.0],
            "roi" => [0.1, 0.2, 0.3],
            "date" => ["2021-01-01", "2021-01-02", "2021-01-03"]
        )
        .unwrap();
        let config = CleaningConfig {
            market_value_quantile: 1.5,
            ..Default::default()
        };
        let err = clean(df, &config, &today()).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn clean_fills_report() {
        let df = df!(
            "Account" => [Some("a"), Some("a"), None],
            "Asset Type" => ["Stock", "Stock", "ETF"],
            "Units Held" => [1.0, 1.0, 2.0],
            "Unit Price" => [10.0, 10.0, 5.0],
            "Market Value" => [10.0, 10.0, 12.0],
            "ROI" => [0.1, 0.1, 2.0],
            "Date" => ["2021-01-01", "2021-01-01", "2019-05-05"]
        )
        .unwrap();

        let (out, report) = clean(df, &CleaningConfig::default(), &today()).unwrap();
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_after_dedup, 2);
        assert_eq!(report.rows_out, 1);
        assert_eq!(report.value_mismatches, 1);
        assert!(report.market_value_cap.is_some());
        assert_eq!(
            report.nulls_before.iter().find(|n| n.column == "account").map(|n| n.nulls),
            Some(1)
        );
        assert!(report.nulls_after.iter().all(|n| n.nulls == 0));
        assert_eq!(report.dtypes.len(), out.width());
        assert!(out.column("value_diff").is_err());
    }
}

//! Data Processor Module
//! Cleaning operations on the portfolio table. Each operation takes the
//! table by value and returns the transformed table.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::stats::StatsCalculator;

/// Columns the cleaning steps read without a presence check.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "date",
    "roi",
    "units_held",
    "unit_price",
    "market_value",
    "asset_type",
];

/// Consistency-check columns removed before the table is written.
pub const DIAGNOSTIC_COLUMNS: [&str; 2] = ["recalculated_value", "value_diff"];

/// `num_days_from_ce` of 1970-01-01, the epoch of Polars' Date type.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("Column name '{0}' appears more than once after normalization")]
    DuplicateColumn(String),
}

/// Handles data cleaning and transformation operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Trim, lowercase and replace spaces with underscores.
    pub fn normalize_column_name(name: &str) -> String {
        name.trim().to_lowercase().replace(' ', "_")
    }

    /// Rename every column with [`Self::normalize_column_name`].
    pub fn normalize_column_names(df: DataFrame) -> Result<DataFrame, ProcessorError> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = Self::normalize_column_name(column.name().as_str());
            if !seen.insert(name.clone()) {
                return Err(ProcessorError::DuplicateColumn(name));
            }
            let mut column = column.clone();
            column.rename(name.into());
            columns.push(column);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Fail with every absent name from `required` at once.
    pub fn check_required_columns(df: &DataFrame, required: &[&str]) -> Result<(), ProcessorError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| df.column(name).is_err())
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProcessorError::MissingColumns(missing))
        }
    }

    /// Fill nulls in the listed text columns with `fill`, then trim every value.
    /// Columns not present in the table are skipped.
    pub fn impute_text_columns(
        mut df: DataFrame,
        columns: &[String],
        fill: &str,
    ) -> Result<DataFrame, ProcessorError> {
        for name in columns {
            let filled: Vec<String> = match df.column(name) {
                Ok(column) => column
                    .cast(&DataType::String)?
                    .str()?
                    .into_iter()
                    .map(|v| v.unwrap_or(fill).trim().to_string())
                    .collect(),
                Err(_) => {
                    debug!(column = %name, "text column absent, skipping");
                    continue;
                }
            };
            df.with_column(Column::new(name.as_str().into(), filled))?;
        }
        Ok(df)
    }

    /// Coerce the listed columns to Float64 and fill nulls (and NaN) with `fill`.
    /// Columns not present in the table are skipped.
    pub fn impute_numeric_columns(
        mut df: DataFrame,
        columns: &[String],
        fill: f64,
    ) -> Result<DataFrame, ProcessorError> {
        for name in columns {
            let filled: Vec<f64> = match df.column(name) {
                Ok(column) => column
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(fill))
                    .collect(),
                Err(_) => {
                    debug!(column = %name, "numeric column absent, skipping");
                    continue;
                }
            };
            df.with_column(Column::new(name.as_str().into(), filled))?;
        }
        Ok(df)
    }

    /// Parse a single date cell. Datetime values keep only their date part.
    pub fn parse_date(value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .or_else(|| {
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                    .map(|dt| dt.date())
            })
    }

    /// Convert the `date` column to a Date type. Unparseable cells become null.
    pub fn parse_dates(mut df: DataFrame) -> Result<DataFrame, ProcessorError> {
        let days: Vec<Option<i32>> = df
            .column("date")?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.and_then(Self::parse_date).map(date_to_days))
            .collect();

        let unparsed = days.iter().filter(|d| d.is_none()).count();
        if unparsed > 0 {
            warn!(rows = unparsed, "date values missing or unparseable, set to null");
        }

        let dates = Column::new("date".into(), days).cast(&DataType::Date)?;
        df.with_column(dates)?;
        Ok(df)
    }

    /// Drop rows identical to an earlier row across all columns, keeping order.
    pub fn drop_duplicates(df: DataFrame) -> Result<DataFrame, ProcessorError> {
        let deduped = df.unique_stable(None, UniqueKeepStrategy::First, None)?;

        let removed = df.height() - deduped.height();
        if removed > 0 {
            info!(rows = removed, "removed duplicate rows");
        }
        Ok(deduped)
    }

    /// Add `recalculated_value = units_held * unit_price` and
    /// `value_diff = market_value - recalculated_value`.
    ///
    /// Returns the table and the number of rows whose difference is non-zero.
    pub fn recompute_market_value(mut df: DataFrame) -> Result<(DataFrame, usize), ProcessorError> {
        let units = float_values(&df, "units_held")?;
        let prices = float_values(&df, "unit_price")?;
        let market = float_values(&df, "market_value")?;

        let recalculated: Vec<f64> = units.iter().zip(&prices).map(|(u, p)| u * p).collect();
        let diff: Vec<f64> = market
            .iter()
            .zip(&recalculated)
            .map(|(m, r)| m - r)
            .collect();
        let mismatches = diff.iter().filter(|d| **d != 0.0).count();

        df.with_column(Column::new(DIAGNOSTIC_COLUMNS[0].into(), recalculated))?;
        df.with_column(Column::new(DIAGNOSTIC_COLUMNS[1].into(), diff))?;
        Ok((df, mismatches))
    }

    /// Replace every `market_value` strictly above its `quantile` with that value.
    ///
    /// Returns the table and the cap, or `None` when there is nothing to cap.
    pub fn cap_market_value(
        mut df: DataFrame,
        quantile: f64,
    ) -> Result<(DataFrame, Option<f64>), ProcessorError> {
        let values = float_values(&df, "market_value")?;
        let Some(cap) = StatsCalculator::quantile(&values, quantile) else {
            return Ok((df, None));
        };

        let capped: Vec<f64> = values
            .iter()
            .map(|&v| if v > cap { cap } else { v })
            .collect();
        let replaced = values.iter().filter(|&&v| v > cap).count();
        info!(cap, rows = replaced, "capped market_value outliers");

        df.with_column(Column::new("market_value".into(), capped))?;
        Ok((df, Some(cap)))
    }

    /// Clamp `roi` into `[min, max]`.
    pub fn clip_roi(mut df: DataFrame, min: f64, max: f64) -> Result<DataFrame, ProcessorError> {
        let clipped: Vec<f64> = float_values(&df, "roi")?
            .into_iter()
            .map(|v| v.clamp(min, max))
            .collect();
        df.with_column(Column::new("roi".into(), clipped))?;
        Ok(df)
    }

    /// Keep rows whose `date` is on or after `min_date`. Null dates are dropped.
    pub fn filter_by_date(df: DataFrame, min_date: NaiveDate) -> Result<DataFrame, ProcessorError> {
        let keep: Vec<bool> = date_values(&df)?
            .into_iter()
            .map(|d| d.is_some_and(|d| d >= min_date))
            .collect();

        let dropped = keep.iter().filter(|k| !**k).count();
        info!(rows = dropped, %min_date, "dropped rows dated before cutoff or undated");

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        Ok(df.filter(&mask)?)
    }

    /// Lowercase `asset_type`, then replace values that exactly match a synonym key.
    pub fn normalize_asset_type(
        mut df: DataFrame,
        synonyms: &BTreeMap<String, String>,
    ) -> Result<DataFrame, ProcessorError> {
        let normalized: Vec<Option<String>> = df
            .column("asset_type")?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| {
                v.map(|s| {
                    let lower = s.to_lowercase();
                    synonyms.get(&lower).cloned().unwrap_or(lower)
                })
            })
            .collect();
        df.with_column(Column::new("asset_type".into(), normalized))?;
        Ok(df)
    }

    /// Add `annualized_roi = roi * 100` and `holding_days = today - date` in whole days.
    pub fn derive_features(mut df: DataFrame, today: NaiveDate) -> Result<DataFrame, ProcessorError> {
        let annualized: Vec<f64> = float_values(&df, "roi")?
            .into_iter()
            .map(|roi| roi * 100.0)
            .collect();
        let holding_days: Vec<Option<i64>> = date_values(&df)?
            .into_iter()
            .map(|d| d.map(|d| (today - d).num_days()))
            .collect();

        df.with_column(Column::new("annualized_roi".into(), annualized))?;
        df.with_column(Column::new("holding_days".into(), holding_days))?;
        Ok(df)
    }

    /// Remove the consistency-check columns if present.
    pub fn drop_diagnostic_columns(mut df: DataFrame) -> Result<DataFrame, ProcessorError> {
        for name in DIAGNOSTIC_COLUMNS {
            if df.column(name).is_ok() {
                df = df.drop(name)?;
            }
        }
        Ok(df)
    }
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE)
}

/// Column values as f64, nulls as NaN.
fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, ProcessorError> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// The `date` column as calendar dates.
fn date_values(df: &DataFrame) -> Result<Vec<Option<NaiveDate>>, ProcessorError> {
    let dates = df.column("date")?.cast(&DataType::Date)?;
    let days = dates.date()?;
    Ok((0..df.height())
        .map(|i| days.get(i).and_then(days_to_date))
        .collect())
}

//! Statistics Calculator Module
//! Percentiles and per-column summaries used by the cleaning steps and run reports.

use polars::prelude::*;

/// Null count for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: usize,
}

/// Data type of one column, as Polars names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub column: String,
    pub dtype: String,
}

/// Stateless statistics helpers.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = (rank.floor() as usize).min(n - 1);
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Quantile `q` in `[0, 1]` of unsorted values, ignoring NaN.
    /// `None` when the slice is empty or all NaN.
    pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(Self::percentile(&sorted, q * 100.0))
    }

    /// Null count per column, in column order.
    pub fn null_counts(df: &DataFrame) -> Vec<ColumnNulls> {
        df.get_columns()
            .iter()
            .map(|col| ColumnNulls {
                column: col.name().to_string(),
                nulls: col.null_count(),
            })
            .collect()
    }

    /// Data type per column, in column order.
    pub fn dtypes(df: &DataFrame) -> Vec<ColumnType> {
        df.get_columns()
            .iter()
            .map(|col| ColumnType {
                column: col.name().to_string(),
                dtype: col.dtype().to_string(),
            })
            .collect()
    }
}

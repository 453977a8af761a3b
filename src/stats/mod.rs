//! Stats module - Percentiles and column summaries

mod calculator;

pub use calculator::{ColumnNulls, ColumnType, StatsCalculator};

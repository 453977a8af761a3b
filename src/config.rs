//! Cleaning rule configuration.
//!
//! Every field has a default, so an override file only needs the keys it changes:
//!
//! ```json
//! { "market_value_quantile": 0.95, "min_date": "2022-01-01" }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunable constants of the cleaning steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Text columns filled with `text_fill` and trimmed, when present.
    pub text_columns: Vec<String>,
    /// Numeric columns coerced to float and filled with `numeric_fill`, when present.
    pub numeric_columns: Vec<String>,
    pub text_fill: String,
    pub numeric_fill: f64,
    /// Quantile of `market_value` above which values are capped.
    pub market_value_quantile: f64,
    pub roi_min: f64,
    pub roi_max: f64,
    /// Rows dated before this (or undated) are dropped.
    pub min_date: NaiveDate,
    /// Exact-match replacements applied to lowercased `asset_type`.
    /// Keys are matched verbatim, trailing whitespace included.
    pub asset_type_synonyms: BTreeMap<String, String>,
    /// Rows of raw input shown in the log.
    pub preview_rows: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            text_columns: ["account", "asset_symbol", "asset_type", "sector"]
                .map(String::from)
                .to_vec(),
            numeric_columns: ["units_held", "unit_price", "market_value", "roi", "dividend"]
                .map(String::from)
                .to_vec(),
            text_fill: "Unknown".to_string(),
            numeric_fill: 0.0,
            market_value_quantile: 0.99,
            roi_min: -1.0,
            roi_max: 1.0,
            min_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            asset_type_synonyms: [("mutualfund", "mutual fund"), ("stock ", "stock"), ("etf ", "etf")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            preview_rows: 5,
        }
    }
}

impl CleaningConfig {
    /// Parse a JSON config; absent keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.market_value_quantile) {
            return Err(ConfigError::Invalid(format!(
                "market_value_quantile must be within [0, 1], got {}",
                self.market_value_quantile
            )));
        }
        if self.roi_min.is_nan() || self.roi_max.is_nan() || self.roi_min > self.roi_max {
            return Err(ConfigError::Invalid(format!(
                "roi_min ({}) must not exceed roi_max ({})",
                self.roi_min, self.roi_max
            )));
        }
        Ok(())
    }
}

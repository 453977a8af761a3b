//! CSV Data Loader Module
//! Handles CSV file loading and saving using Polars.

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to load CSV '{}': {source}", .path.display())]
    Load { path: PathBuf, source: PolarsError },
    #[error("Failed to create output file '{}': {source}", .path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to save CSV '{}': {source}", .path.display())]
    Save { path: PathBuf, source: PolarsError },
}

/// Reads and writes the portfolio table as comma-separated text with a header row.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file using Polars.
    pub fn load_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::NotFound(path.to_path_buf()));
        }

        let load_err = |source| LoaderError::Load {
            path: path.to_path_buf(),
            source,
        };

        // Cells that do not fit the inferred column type load as null
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()
            .map_err(load_err)?
            .collect()
            .map_err(load_err)?;

        info!(
            rows = df.height(),
            columns = df.width(),
            "loaded {}",
            path.display()
        );
        Ok(df)
    }

    /// Write the DataFrame as CSV with a header row and no index column.
    pub fn save_csv(df: &DataFrame, path: &Path) -> Result<(), LoaderError> {
        let mut file = File::create(path).map_err(|source| LoaderError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df.clone())
            .map_err(|source| LoaderError::Save {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(rows = df.height(), "wrote {}", path.display());
        Ok(())
    }

    /// First `rows` rows of the DataFrame, for console previews.
    pub fn preview(df: &DataFrame, rows: usize) -> DataFrame {
        df.head(Some(rows))
    }
}

//! Portfolio Cleaner - Financial portfolio CSV cleaning pipeline
//!
//! Loads a portfolio CSV, imputes, deduplicates, caps outliers, filters by date,
//! derives features and writes the cleaned table back out.

pub mod clock;
pub mod config;
pub mod data;
pub mod logging;
pub mod pipeline;
pub mod stats;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CleaningConfig, ConfigError};
pub use pipeline::{clean, run, PipelineError, RunReport};

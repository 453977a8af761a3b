//! Portfolio Cleaner CLI
//!
//! Cleans a financial portfolio CSV and writes the result to a new file.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use portfolio_cleaner::logging::init_logging;
use portfolio_cleaner::{run, CleaningConfig, Clock, FixedClock, SystemClock};

#[derive(Parser)]
#[command(
    name = "portfolio-cleaner",
    about = "Clean and normalize a financial portfolio CSV"
)]
struct Cli {
    /// Input CSV with a header row.
    #[arg(long, default_value = "financial_portfolio_tracker_complex.csv")]
    input: PathBuf,

    /// Output CSV path.
    #[arg(long, default_value = "cleaned_financial_portfolio_advanced.csv")]
    output: PathBuf,

    /// JSON file overriding cleaning rules.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Date used as "today" for holding_days (YYYY-MM-DD). Defaults to the local date.
    #[arg(long, value_parser = parse_date_arg)]
    today: Option<NaiveDate>,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CleaningConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CleaningConfig::default(),
    };

    let clock: Box<dyn Clock> = match cli.today {
        Some(day) => Box::new(FixedClock(day)),
        None => Box::new(SystemClock),
    };

    run(&cli.input, &cli.output, &config, clock.as_ref())
        .with_context(|| format!("cleaning {}", cli.input.display()))?;
    Ok(())
}

//! Data module - CSV loading and cleaning operations

mod loader;
mod processor;

pub use loader::{DataLoader, LoaderError};
pub use processor::{DataProcessor, ProcessorError, DIAGNOSTIC_COLUMNS, REQUIRED_COLUMNS};

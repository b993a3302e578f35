//! Output module for statistics and exports
//!
//! This module handles:
//! - Summarizing what the database holds
//! - Exporting tables as CSV or JSON lines

mod export;
pub mod stats;

pub use export::{export_table, ExportFormat};
pub use stats::{load_statistics, print_statistics, CatalogStatistics};

use thiserror::Error;

/// Errors that can occur while writing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown export format: {0} (expected csv or jsonl)")]
    UnknownFormat(String),
}

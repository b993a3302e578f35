//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::model::{RunRecord, Stage};
use crate::storage::{Storage, Table};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Row count of every table
    pub rows_by_table: BTreeMap<&'static str, u64>,

    /// Outstanding failed items per stage
    pub failures_by_stage: BTreeMap<Stage, u64>,

    /// Articles that have no detail row yet
    pub articles_missing_data: u64,

    /// Detail rows lacking each field
    pub missing_fields: BTreeMap<&'static str, u64>,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl CatalogStatistics {
    pub fn rows(&self, table: Table) -> u64 {
        self.rows_by_table.get(table.name()).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CatalogStatistics, HarvestError> {
    let mut rows_by_table = BTreeMap::new();
    for table in Table::ALL {
        rows_by_table.insert(table.name(), storage.count_rows(table)?);
    }

    let mut failures_by_stage = BTreeMap::new();
    for item in storage.failures(None)? {
        *failures_by_stage.entry(item.stage).or_insert(0) += 1;
    }

    let articles_missing_data = storage.articles_without_data()?.len() as u64;

    let mut missing_fields = BTreeMap::new();
    for data in storage.article_data()? {
        for field in data.missing_fields() {
            *missing_fields.entry(field).or_insert(0) += 1;
        }
    }

    Ok(CatalogStatistics {
        rows_by_table,
        failures_by_stage,
        articles_missing_data,
        missing_fields,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  Run #{} ({})", run.id, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  First stage: {}", run.first_stage.number());
        println!();
    }

    println!("Rows:");
    for table in Table::ALL {
        println!("  {}: {}", table, stats.rows(table));
    }
    println!();

    let data_rows = stats.rows(Table::ArticlesData);
    if !stats.missing_fields.is_empty() {
        println!("Missing Fields:");
        for (field, count) in &stats.missing_fields {
            let percentage = if data_rows > 0 {
                (*count as f64 / data_rows as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", field, count, percentage);
        }
        println!();
    }

    if !stats.failures_by_stage.is_empty() {
        println!("Failed Items:");
        for (stage, count) in &stats.failures_by_stage {
            println!("  {} {}: {}", stage, stage.to_db_string(), count);
        }
        println!();
    }

    let articles = stats.rows(Table::Articles);
    let coverage = if articles > 0 {
        (articles.saturating_sub(stats.articles_missing_data) as f64 / articles as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Coverage: {:.1}% ({} / {} articles have details)",
        coverage,
        articles.saturating_sub(stats.articles_missing_data),
        articles
    );
}

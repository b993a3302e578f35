//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{
    Article, ArticleData, Category, FailedItem, Page, RunRecord, RunStatus, Stage,
};
use crate::storage::table::{Table, TableData};
use crate::storage::writer::WriteOp;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write is an upsert on the record's natural key, so replaying the
/// same writes leaves the database unchanged.
pub trait Storage {
    // ===== Run Management =====

    /// Records the start of a run and returns its id
    fn create_run(&mut self, config_hash: &str, first_stage: Stage) -> StorageResult<i64>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Catalog Writes =====

    fn upsert_categories(&mut self, categories: &[Category]) -> StorageResult<usize>;

    /// Replaces the listing pages of one category
    ///
    /// Pages beyond the new count left over from an earlier run are removed.
    fn replace_category_pages(&mut self, category_id: i64, pages: &[Page])
        -> StorageResult<usize>;

    /// Inserts or overwrites listing pages without removing any
    fn upsert_category_pages(&mut self, category_id: i64, pages: &[Page])
        -> StorageResult<usize>;

    fn upsert_articles(&mut self, articles: &[Article]) -> StorageResult<usize>;

    /// Inserts or overwrites detail rows; the latest values win
    fn upsert_article_data(&mut self, data: &[ArticleData]) -> StorageResult<usize>;

    // ===== Failure Tracking =====

    /// Records (or refreshes) an exhausted item
    fn record_failure(&mut self, item: &FailedItem) -> StorageResult<()>;

    /// Removes the failure row of an item that has since succeeded
    fn clear_failure(&mut self, stage: Stage, url: &str) -> StorageResult<()>;

    // ===== Batched Writes =====

    /// Applies one write operation, returning the number of rows it touched
    fn apply(&mut self, op: &WriteOp) -> StorageResult<usize> {
        match op {
            WriteOp::Categories(categories) => self.upsert_categories(categories),
            WriteOp::Pages {
                category_id,
                pages,
                complete: true,
            } => self.replace_category_pages(*category_id, pages),
            WriteOp::Pages {
                category_id,
                pages,
                complete: false,
            } => self.upsert_category_pages(*category_id, pages),
            WriteOp::Articles(articles) => self.upsert_articles(articles),
            WriteOp::ArticleData(data) => self.upsert_article_data(data),
            WriteOp::Failure(item) => self.record_failure(item).map(|_| 1),
            WriteOp::Resolved { stage, url } => self.clear_failure(*stage, url).map(|_| 0),
        }
    }

    /// Applies a batch of operations
    ///
    /// Backends with transactions should apply the batch atomically.
    fn apply_batch(&mut self, ops: &[WriteOp]) -> StorageResult<usize> {
        let mut rows = 0;
        for op in ops {
            rows += self.apply(op)?;
        }
        Ok(rows)
    }

    // ===== Reads =====

    fn categories(&self) -> StorageResult<Vec<Category>>;

    fn pages(&self) -> StorageResult<Vec<Page>>;

    fn articles(&self) -> StorageResult<Vec<Article>>;

    fn article_data(&self) -> StorageResult<Vec<ArticleData>>;

    /// Articles that have no detail row yet
    fn articles_without_data(&self) -> StorageResult<Vec<Article>>;

    /// Failed items, optionally restricted to one stage
    fn failures(&self, stage: Option<Stage>) -> StorageResult<Vec<FailedItem>>;

    // ===== Statistics =====

    /// Counts the rows of a table
    fn count_rows(&self, table: Table) -> StorageResult<u64>;

    /// Loads a whole table as generic columns and rows
    fn load_table(&self, table: Table) -> StorageResult<TableData>;
}

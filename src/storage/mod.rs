//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Idempotent upserts of every catalog entity
//! - The single writer task that batches stage output into transactions
//! - Failure and run tracking for resumption
//! - Generic table reads for export and statistics

mod schema;
mod sqlite;
mod table;
mod traits;
mod writer;

pub use sqlite::SqliteStorage;
pub use table::{Cell, Table, TableData};
pub use traits::{Storage, StorageError, StorageResult};
pub use writer::{SinkHandle, SinkWriter, WriteOp, WriteReport};

use crate::model::{Article, ArticleData, Category, FailedItem, Page};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Reads every category from the database at `path`
pub fn categories(path: &Path) -> StorageResult<Vec<Category>> {
    open_storage(path)?.categories()
}

/// Reads every listing page from the database at `path`
pub fn pages(path: &Path) -> StorageResult<Vec<Page>> {
    open_storage(path)?.pages()
}

/// Reads every article from the database at `path`
pub fn articles(path: &Path) -> StorageResult<Vec<Article>> {
    open_storage(path)?.articles()
}

/// Reads every article detail row from the database at `path`
pub fn article_data(path: &Path) -> StorageResult<Vec<ArticleData>> {
    open_storage(path)?.article_data()
}

/// Reads every recorded failure from the database at `path`
pub fn failures(path: &Path) -> StorageResult<Vec<FailedItem>> {
    open_storage(path)?.failures(None)
}

/// Loads one table from the database at `path` as generic rows
pub fn load_table(path: &Path, table: Table) -> StorageResult<TableData> {
    open_storage(path)?.load_table(table)
}

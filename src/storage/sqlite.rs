//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{
    Article, ArticleData, Category, FailedItem, Page, RunRecord, RunStatus, Stage,
};
use crate::storage::schema::initialize_schema;
use crate::storage::table::{Cell, Table, TableData};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::writer::WriteOp;
use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    ///
    /// The database runs in WAL mode so a reader connection can load stage
    /// inputs while the writer task holds its own connection.
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(30))?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn encode_list(values: &[String]) -> StorageResult<String> {
    Ok(serde_json::to_string(values)?)
}

fn decode_list(raw: &str) -> StorageResult<Vec<String>> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_stage(raw: &str) -> StorageResult<Stage> {
    Stage::from_db_string(raw)
        .ok_or_else(|| StorageError::Database(format!("Unknown stage in database: {}", raw)))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        first_stage: Stage::from_db_string(&row.get::<_, String>(4)?).unwrap_or(Stage::Categories),
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

// Write helpers take a plain connection so they run the same inside and
// outside a transaction.

fn upsert_categories_on(conn: &Connection, categories: &[Category]) -> StorageResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO categories (id, url) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET url = excluded.url",
    )?;
    for category in categories {
        stmt.execute(params![category.id, category.url])?;
    }
    Ok(categories.len())
}

fn write_category_pages_on(
    conn: &Connection,
    category_id: i64,
    pages: &[Page],
    prune: bool,
) -> StorageResult<usize> {
    if let Some(page) = pages.iter().find(|page| page.category_id != category_id) {
        return Err(StorageError::ConstraintViolation(format!(
            "Page {} belongs to category {}, not {}",
            page.url, page.category_id, category_id
        )));
    }

    if prune {
        conn.execute(
            "DELETE FROM pages WHERE category_id = ?1 AND page_index > ?2",
            params![category_id, pages.len() as i64],
        )?;
    }

    let mut stmt = conn.prepare_cached(
        "INSERT INTO pages (category_id, url, page_index) VALUES (?1, ?2, ?3)
         ON CONFLICT(category_id, page_index) DO UPDATE SET url = excluded.url",
    )?;
    for page in pages {
        stmt.execute(params![page.category_id, page.url, page.page_index])?;
    }
    Ok(pages.len())
}

fn upsert_articles_on(conn: &Connection, articles: &[Article]) -> StorageResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO articles (id, url) VALUES (?1, ?2)
         ON CONFLICT(id, url) DO NOTHING",
    )?;
    for article in articles {
        stmt.execute(params![article.id, article.url])?;
    }
    Ok(articles.len())
}

fn upsert_article_data_on(conn: &Connection, data: &[ArticleData]) -> StorageResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO articles_data
            (article_id, article_url, description, colour, tags, materials, images_urls)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(article_id, article_url) DO UPDATE SET
            description = excluded.description,
            colour = excluded.colour,
            tags = excluded.tags,
            materials = excluded.materials,
            images_urls = excluded.images_urls",
    )?;
    for row in data {
        stmt.execute(params![
            row.article_id,
            row.article_url,
            row.description,
            row.colour,
            encode_list(&row.tags)?,
            encode_list(&row.materials)?,
            encode_list(&row.images_urls)?,
        ])?;
    }
    Ok(data.len())
}

fn record_failure_on(conn: &Connection, item: &FailedItem) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO failed_items (stage, url, item_id, attempts, error, failed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(stage, url) DO UPDATE SET
            item_id = excluded.item_id,
            attempts = excluded.attempts,
            error = excluded.error,
            failed_at = excluded.failed_at",
        params![
            item.stage.to_db_string(),
            item.url,
            item.item_id,
            item.attempts,
            item.error,
            item.failed_at,
        ],
    )?;
    Ok(())
}

fn clear_failure_on(conn: &Connection, stage: Stage, url: &str) -> StorageResult<()> {
    conn.execute(
        "DELETE FROM failed_items WHERE stage = ?1 AND url = ?2",
        params![stage.to_db_string(), url],
    )?;
    Ok(())
}

fn apply_on(conn: &Connection, op: &WriteOp) -> StorageResult<usize> {
    match op {
        WriteOp::Categories(categories) => upsert_categories_on(conn, categories),
        WriteOp::Pages {
            category_id,
            pages,
            complete,
        } => write_category_pages_on(conn, *category_id, pages, *complete),
        WriteOp::Articles(articles) => upsert_articles_on(conn, articles),
        WriteOp::ArticleData(data) => upsert_article_data_on(conn, data),
        WriteOp::Failure(item) => record_failure_on(conn, item).map(|_| 1),
        WriteOp::Resolved { stage, url } => clear_failure_on(conn, *stage, url).map(|_| 0),
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, first_stage: Stage) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, first_stage, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now(),
                config_hash,
                first_stage.to_db_string(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, first_stage, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, first_stage, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Catalog Writes =====

    fn upsert_categories(&mut self, categories: &[Category]) -> StorageResult<usize> {
        upsert_categories_on(&self.conn, categories)
    }

    fn replace_category_pages(
        &mut self,
        category_id: i64,
        pages: &[Page],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let rows = write_category_pages_on(&tx, category_id, pages, true)?;
        tx.commit()?;
        Ok(rows)
    }

    fn upsert_category_pages(
        &mut self,
        category_id: i64,
        pages: &[Page],
    ) -> StorageResult<usize> {
        write_category_pages_on(&self.conn, category_id, pages, false)
    }

    fn upsert_articles(&mut self, articles: &[Article]) -> StorageResult<usize> {
        upsert_articles_on(&self.conn, articles)
    }

    fn upsert_article_data(&mut self, data: &[ArticleData]) -> StorageResult<usize> {
        upsert_article_data_on(&self.conn, data)
    }

    // ===== Failure Tracking =====

    fn record_failure(&mut self, item: &FailedItem) -> StorageResult<()> {
        record_failure_on(&self.conn, item)
    }

    fn clear_failure(&mut self, stage: Stage, url: &str) -> StorageResult<()> {
        clear_failure_on(&self.conn, stage, url)
    }

    // ===== Batched Writes =====

    fn apply(&mut self, op: &WriteOp) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let rows = apply_on(&tx, op)?;
        tx.commit()?;
        Ok(rows)
    }

    fn apply_batch(&mut self, ops: &[WriteOp]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut rows = 0;
        for op in ops {
            rows += apply_on(&tx, op)?;
        }
        tx.commit()?;
        Ok(rows)
    }

    // ===== Reads =====

    fn categories(&self) -> StorageResult<Vec<Category>> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM categories ORDER BY id")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn pages(&self) -> StorageResult<Vec<Page>> {
        let mut stmt = self.conn.prepare(
            "SELECT category_id, url, page_index FROM pages ORDER BY category_id, page_index",
        )?;
        let pages = stmt
            .query_map([], |row| {
                Ok(Page {
                    category_id: row.get(0)?,
                    url: row.get(1)?,
                    page_index: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn articles(&self) -> StorageResult<Vec<Article>> {
        let mut stmt = self.conn.prepare("SELECT id, url FROM articles ORDER BY id, url")?;
        let articles = stmt
            .query_map([], |row| {
                Ok(Article {
                    id: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(articles)
    }

    fn article_data(&self) -> StorageResult<Vec<ArticleData>> {
        let mut stmt = self.conn.prepare(
            "SELECT article_id, article_url, description, colour, tags, materials, images_urls
             FROM articles_data ORDER BY article_id, article_url",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(article_id, article_url, description, colour, tags, materials, images)| {
                    Ok(ArticleData {
                        article_id,
                        article_url,
                        description,
                        colour,
                        tags: decode_list(&tags)?,
                        materials: decode_list(&materials)?,
                        images_urls: decode_list(&images)?,
                    })
                },
            )
            .collect()
    }

    fn articles_without_data(&self) -> StorageResult<Vec<Article>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.url FROM articles a
             LEFT JOIN articles_data d ON d.article_id = a.id AND d.article_url = a.url
             WHERE d.article_id IS NULL
             ORDER BY a.id, a.url",
        )?;
        let articles = stmt
            .query_map([], |row| {
                Ok(Article {
                    id: row.get(0)?,
                    url: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(articles)
    }

    fn failures(&self, stage: Option<Stage>) -> StorageResult<Vec<FailedItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, url, item_id, attempts, error, failed_at FROM failed_items
             WHERE ?1 IS NULL OR stage = ?1
             ORDER BY stage, url",
        )?;
        let raw = stmt
            .query_map(params![stage.map(|s| s.to_db_string())], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(stage, url, item_id, attempts, error, failed_at)| {
                Ok(FailedItem {
                    stage: parse_stage(&stage)?,
                    url,
                    item_id,
                    attempts,
                    error,
                    failed_at,
                })
            })
            .collect()
    }

    // ===== Statistics =====

    fn count_rows(&self, table: Table) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn load_table(&self, table: Table) -> StorageResult<TableData> {
        let columns = table.columns();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            columns.join(", "),
            table.name(),
            table.order_by()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                (0..columns.len())
                    .map(|i| {
                        Ok(match row.get_ref(i)? {
                            ValueRef::Null => Cell::Null,
                            ValueRef::Integer(v) => Cell::Integer(v),
                            ValueRef::Real(v) => Cell::Real(v),
                            ValueRef::Text(v) | ValueRef::Blob(v) => {
                                Cell::Text(String::from_utf8_lossy(v).into_owned())
                            }
                        })
                    })
                    .collect::<rusqlite::Result<Vec<Cell>>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableData {
            table,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }
}

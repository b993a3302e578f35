//! Database schema definitions
//!
//! One table per catalog entity, keyed by its natural key, plus the
//! bookkeeping tables for runs and failed items.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    first_stage TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Stage 1 output
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL
);

-- Stage 2 output
CREATE TABLE IF NOT EXISTS pages (
    category_id INTEGER NOT NULL REFERENCES categories(id),
    url TEXT NOT NULL,
    page_index INTEGER NOT NULL,
    PRIMARY KEY (category_id, page_index)
);

CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);

-- Stage 3 output; one id may appear under several urls
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY (id, url)
);

-- Stage 4 output; list columns hold JSON arrays
CREATE TABLE IF NOT EXISTS articles_data (
    article_id INTEGER NOT NULL,
    article_url TEXT NOT NULL,
    description TEXT,
    colour TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    materials TEXT NOT NULL DEFAULT '[]',
    images_urls TEXT NOT NULL DEFAULT '[]',
    PRIMARY KEY (article_id, article_url)
);

-- Items whose fetch was exhausted, cleared again on success
CREATE TABLE IF NOT EXISTS failed_items (
    stage TEXT NOT NULL,
    url TEXT NOT NULL,
    item_id INTEGER,
    attempts INTEGER NOT NULL,
    error TEXT NOT NULL,
    failed_at TEXT NOT NULL,
    PRIMARY KEY (stage, url)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

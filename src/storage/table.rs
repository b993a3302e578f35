//! Generic tabular view of the stored data
//!
//! Used by the export and statistics commands, which treat every table the
//! same way.

use std::fmt;

/// The tables that can be read back generically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Categories,
    Pages,
    Articles,
    ArticlesData,
    FailedItems,
    Runs,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Categories,
        Table::Pages,
        Table::Articles,
        Table::ArticlesData,
        Table::FailedItems,
        Table::Runs,
    ];

    /// SQL name of the table
    pub fn name(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Pages => "pages",
            Self::Articles => "articles",
            Self::ArticlesData => "articles_data",
            Self::FailedItems => "failed_items",
            Self::Runs => "runs",
        }
    }

    /// Columns in their stored order
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Categories => &["id", "url"],
            Self::Pages => &["category_id", "url", "page_index"],
            Self::Articles => &["id", "url"],
            Self::ArticlesData => &[
                "article_id",
                "article_url",
                "description",
                "colour",
                "tags",
                "materials",
                "images_urls",
            ],
            Self::FailedItems => &["stage", "url", "item_id", "attempts", "error", "failed_at"],
            Self::Runs => &[
                "id",
                "started_at",
                "finished_at",
                "config_hash",
                "first_stage",
                "status",
            ],
        }
    }

    /// Ordering used when reading the table, so exports are deterministic
    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            Self::Categories => "id",
            Self::Pages => "category_id, page_index",
            Self::Articles => "id, url",
            Self::ArticlesData => "article_id, article_url",
            Self::FailedItems => "stage, url",
            Self::Runs => "id",
        }
    }

    /// Columns holding JSON-encoded lists
    pub fn is_json_column(&self, column: &str) -> bool {
        matches!(self, Self::ArticlesData)
            && matches!(column, "tags" | "materials" | "images_urls")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single stored value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Renders the value the way it appears in a CSV field
    pub fn to_field(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => r.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// A whole table loaded into memory
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub table: Table,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

//! Catalog entities produced by the crawl stages
//!
//! Every record type here corresponds to one table in the database and
//! carries the natural key used for idempotent upserts.

use crate::model::Stage;

/// A top-level product grouping on the storefront
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    /// Site-assigned category id (the `cid` query parameter)
    pub id: i64,

    /// Absolute URL of the first listing page of the category
    pub url: String,
}

/// One paginated listing view within a category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Page {
    /// Id of the category this page belongs to
    pub category_id: i64,

    /// Absolute URL of the listing page
    pub url: String,

    /// 1-based position of the page within its category
    pub page_index: u32,
}

/// A single product as discovered on a listing page
///
/// The same id can legitimately appear under several URLs (colour variants,
/// cross-listed items), so the key is the `(id, url)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Article {
    pub id: i64,
    pub url: String,
}

impl Article {
    /// Natural key used for de-duplication and upserts
    pub fn key(&self) -> (i64, &str) {
        (self.id, self.url.as_str())
    }
}

/// Detail fields extracted from one article page
///
/// Every field is best-effort: a missing field is `None` or empty, never a
/// reason to drop the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleData {
    pub article_id: i64,
    pub article_url: String,
    pub description: Option<String>,
    pub colour: Option<String>,
    pub tags: Vec<String>,
    pub materials: Vec<String>,
    pub images_urls: Vec<String>,
}

impl ArticleData {
    /// Creates an empty record for the given article
    pub fn for_article(article: &Article) -> Self {
        Self {
            article_id: article.id,
            article_url: article.url.clone(),
            ..Self::default()
        }
    }

    /// Names of the detail fields that could not be found
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.description.is_none() {
            missing.push("description");
        }
        if self.colour.is_none() {
            missing.push("colour");
        }
        if self.tags.is_empty() {
            missing.push("tags");
        }
        if self.materials.is_empty() {
            missing.push("materials");
        }
        if self.images_urls.is_empty() {
            missing.push("images_urls");
        }
        missing
    }
}

/// An input item whose fetch was exhausted during a stage
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub stage: Stage,

    /// URL that could not be fetched
    pub url: String,

    /// Key of the item in its input table (category id, article id, ...)
    pub item_id: Option<i64>,

    /// Number of attempts made before giving up
    pub attempts: u32,

    /// Last error observed
    pub error: String,

    /// RFC 3339 timestamp of the failure
    pub failed_at: String,
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub first_stage: Stage,
    pub status: RunStatus,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

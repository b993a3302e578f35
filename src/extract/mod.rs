//! HTML extraction for the storefront
//!
//! Extraction is site-specific: the `SiteExtractor` trait is the seam where a
//! different storefront layout plugs in, and `StorefrontExtractor` is the
//! implementation for the layout this crawler was built against.
//!
//! Extractors never fail. Anything they cannot find is reported as absent,
//! and the caller decides whether that matters.

mod pagination;
mod storefront;

pub use pagination::{generate_page_urls, ProductCounter};
pub use storefront::StorefrontExtractor;

use crate::model::{Article, ArticleData, Category};
use url::Url;

/// Pagination signals found on a listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPagination {
    /// The "viewed X of Y products" counter, if present
    pub counter: Option<ProductCounter>,

    /// Absolute URL of the next listing page, if the page links one
    pub next_url: Option<Url>,

    /// Whether the page lists at least one article
    pub has_articles: bool,
}

/// Detail fields of an article page, before they are tied to an article key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetail {
    pub description: Option<String>,
    pub colour: Option<String>,
    pub tags: Vec<String>,
    pub materials: Vec<String>,
    pub images_urls: Vec<String>,
}

impl ArticleDetail {
    /// Attaches the detail fields to the article they were extracted for
    pub fn into_data(self, article: &Article) -> ArticleData {
        ArticleData {
            description: self.description,
            colour: self.colour,
            tags: self.tags,
            materials: self.materials,
            images_urls: self.images_urls,
            ..ArticleData::for_article(article)
        }
    }
}

/// Parses fetched documents into catalog entities
///
/// Implementations must be cheap to share between tasks; all methods take
/// `&self` and are called concurrently from every stage.
pub trait SiteExtractor: Send + Sync + 'static {
    /// Extracts category links from a navigation page
    fn categories(&self, html: &str, page_url: &Url) -> Vec<Category>;

    /// Extracts pagination signals from the first listing page of a category
    fn pagination(&self, html: &str, page_url: &Url) -> ListingPagination;

    /// Extracts article links and ids from a listing page
    fn articles(&self, html: &str, page_url: &Url) -> Vec<Article>;

    /// Extracts detail fields from an article page
    fn article_detail(&self, html: &str, page_url: &Url) -> ArticleDetail;
}

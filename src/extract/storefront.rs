//! Extractor for the target storefront layout
//!
//! # Layout
//!
//! - Navigation: category links carry a numeric `cid` query parameter and a
//!   `/cat/` path segment
//! - Listing pages: one `<article>` per product, holding the product link;
//!   the product id is in `data-product-id`, in the element `id`
//!   (`product-1234`), or in the `/prd/1234` path segment
//! - Article pages: most fields live in a JSON object assigned to
//!   `window.<site>.pdp.config.product`; tags and materials are in the
//!   `#productDescriptionDetails` and `#productDescriptionAboutMe` blocks

use crate::extract::{ArticleDetail, ListingPagination, ProductCounter, SiteExtractor};
use crate::model::{Article, Category};
use crate::url::{canonicalize_link, same_site};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

fn product_config_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"window\.[A-Za-z0-9_$]+\.pdp\.config\.product\s*=\s*(.*);")
            .expect("product config pattern is valid")
    })
}

fn product_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/prd/(\d+)").expect("product path pattern is valid"))
}

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("digits pattern is valid"))
}

/// Product JSON embedded in article pages
#[derive(Debug, Deserialize)]
struct ProductConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    images: Vec<ProductImage>,
}

#[derive(Debug, Deserialize)]
struct ProductImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    colour: Option<String>,
}

/// Extractor for the storefront this crawler targets
#[derive(Debug, Clone)]
pub struct StorefrontExtractor {
    /// Query parameter holding the category id
    category_param: String,

    /// Category links whose URL contains one of these are promotional
    /// collections, not real categories
    excluded_category_markers: Vec<String>,
}

impl Default for StorefrontExtractor {
    fn default() -> Self {
        Self {
            category_param: "cid".to_string(),
            excluded_category_markers: vec!["ctas".to_string(), "new-in".to_string()],
        }
    }
}

impl StorefrontExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the category id from a canonical category URL
    fn category_id(&self, url: &Url) -> Option<i64> {
        if !url.path().contains("/cat") {
            return None;
        }
        url.query_pairs()
            .find(|(k, _)| k == self.category_param.as_str())
            .and_then(|(_, v)| v.parse().ok())
    }

    fn is_excluded(&self, url: &Url) -> bool {
        let s = url.as_str();
        self.excluded_category_markers
            .iter()
            .any(|marker| s.contains(marker.as_str()))
    }

    /// Reads the product id of an `<article>` element
    fn article_id(element: &ElementRef<'_>, url: &Url) -> Option<i64> {
        let from_attr = ["data-product-id", "data-id", "id"]
            .iter()
            .filter_map(|attr| element.value().attr(attr))
            .find_map(|value| {
                digits_regex()
                    .find(value)
                    .and_then(|m| m.as_str().parse().ok())
            });

        from_attr.or_else(|| {
            product_path_regex()
                .captures(url.path())
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    }

    fn parse_product_config(html: &str, page_url: &Url) -> Option<ProductConfig> {
        let captures = product_config_regex().captures(html)?;
        let json = captures.get(1)?.as_str();
        match serde_json::from_str(json) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Malformed product JSON on {}: {}", page_url, e);
                None
            }
        }
    }
}

impl SiteExtractor for StorefrontExtractor {
    fn categories(&self, html: &str, page_url: &Url) -> Vec<Category> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let mut seen_ids = HashSet::new();
        let mut categories = Vec::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = canonicalize_link(href, page_url) else {
                continue;
            };
            if !same_site(&url, page_url) || self.is_excluded(&url) {
                continue;
            }
            let Some(id) = self.category_id(&url) else {
                continue;
            };
            if seen_ids.insert(id) {
                categories.push(Category {
                    id,
                    url: url.to_string(),
                });
            }
        }

        categories
    }

    fn pagination(&self, html: &str, page_url: &Url) -> ListingPagination {
        let document = Html::parse_document(html);

        let counter = document
            .root_element()
            .text()
            .find_map(ProductCounter::parse);

        let next_url = Selector::parse("link[rel='next'][href], a[rel='next'][href]")
            .ok()
            .and_then(|selector| {
                document
                    .select(&selector)
                    .filter_map(|e| e.value().attr("href"))
                    .find_map(|href| canonicalize_link(href, page_url))
            })
            .filter(|next| next != page_url);

        let has_articles = Selector::parse("article a[href]")
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false);

        ListingPagination {
            counter,
            next_url,
            has_articles,
        }
    }

    fn articles(&self, html: &str, page_url: &Url) -> Vec<Article> {
        let document = Html::parse_document(html);
        let (Ok(article_selector), Ok(link_selector)) =
            (Selector::parse("article"), Selector::parse("a[href]"))
        else {
            return Vec::new();
        };

        let mut articles = Vec::new();
        for element in document.select(&article_selector) {
            let Some(href) = element
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };
            let Some(url) = canonicalize_link(href, page_url) else {
                continue;
            };

            match Self::article_id(&element, &url) {
                Some(id) => articles.push(Article {
                    id,
                    url: url.to_string(),
                }),
                None => tracing::warn!("No product id for article link {} on {}", url, page_url),
            }
        }

        articles
    }

    fn article_detail(&self, html: &str, page_url: &Url) -> ArticleDetail {
        let mut detail = ArticleDetail::default();

        if let Some(product) = Self::parse_product_config(html, page_url) {
            detail.description = product
                .name
                .map(|name| name.trim().to_lowercase())
                .filter(|name| !name.is_empty());

            detail.colour = product
                .images
                .iter()
                .filter_map(|image| image.colour.as_deref())
                .map(str::trim)
                .find(|colour| !colour.is_empty())
                .map(str::to_lowercase);

            detail.images_urls = product
                .images
                .into_iter()
                .filter_map(|image| image.url)
                .filter(|url| !url.is_empty())
                .collect();
        }

        let document = Html::parse_document(html);

        if detail.description.is_none() {
            detail.description = Selector::parse("h1").ok().and_then(|selector| {
                document
                    .select(&selector)
                    .next()
                    .map(|h1| h1.text().collect::<String>().trim().to_lowercase())
                    .filter(|s| !s.is_empty())
            });
        }

        if let Ok(selector) = Selector::parse("#productDescriptionDetails li") {
            detail.tags = document
                .select(&selector)
                .map(|li| li.text().collect::<String>().trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect();
        }

        if let Ok(selector) = Selector::parse("#productDescriptionAboutMe") {
            if let Some(block) = document.select(&selector).next() {
                detail.materials = block
                    .text()
                    .flat_map(str::lines)
                    .map(|line| line.trim().to_lowercase())
                    .filter(|line| !line.is_empty())
                    .collect();
            }
        }

        detail
    }
}

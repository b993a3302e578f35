//! Pagination helpers for listing pages
//!
//! Listing pages announce their size with a counter such as
//! "You've viewed 72 of 12,911 products"; the total number of pages is
//! derived from it and the page URLs are generated from the category URL.

use crate::config::PaginationConfig;
use crate::url::with_query_param;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn counter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"You've viewed ([0-9][0-9,]*) of ([0-9][0-9,]*) products")
            .expect("product counter pattern is valid")
    })
}

/// The "viewed X of Y products" counter of a listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductCounter {
    /// Number of products shown on one page
    pub per_page: u64,

    /// Number of products in the whole category
    pub total: u64,
}

impl ProductCounter {
    /// Parses the counter out of a text fragment
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_harvest::extract::ProductCounter;
    ///
    /// let counter = ProductCounter::parse("You've viewed 72 of 12,911 products").unwrap();
    /// assert_eq!(counter.total_pages(), 180);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let captures = counter_regex().captures(text)?;
        let per_page = parse_grouped_number(captures.get(1)?.as_str())?;
        let total = parse_grouped_number(captures.get(2)?.as_str())?;
        Some(Self { per_page, total })
    }

    /// Number of listing pages needed to show every product
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            0
        } else if self.per_page == 0 {
            1
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}

/// Parses a number written with thousands separators ("12,911")
fn parse_grouped_number(s: &str) -> Option<u64> {
    s.replace(',', "").parse().ok()
}

/// Generates the URLs of pages `1..=total_pages` of a category
///
/// The count is capped at `max_pages` from the configuration.
pub fn generate_page_urls(first_page: &Url, total_pages: u64, config: &PaginationConfig) -> Vec<Url> {
    let capped = total_pages.min(u64::from(config.max_pages));
    (1..=capped)
        .map(|n| with_query_param(first_page, &config.page_param, &n.to_string()))
        .collect()
}

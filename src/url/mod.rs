//! URL handling module for Catalog-Harvest
//!
//! This module provides link canonicalization, same-site checks, and the
//! query manipulation used to generate paginated listing URLs.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{same_site, site_host};
pub use normalize::{canonicalize_link, parse_absolute, with_query_param};

//! End-to-end tests against a mock storefront

mod crawl_tests;
mod pagination_tests;
mod resume_tests;
mod support;

//! Data model for the catalog crawl
//!
//! - `Stage`: the four ordered pipeline stages
//! - `Category`, `Page`, `Article`, `ArticleData`: the catalog entities
//! - `FailedItem`, `RunRecord`: crawl bookkeeping

mod records;
mod stage;

pub use records::{Article, ArticleData, Category, FailedItem, Page, RunRecord, RunStatus};
pub use stage::Stage;

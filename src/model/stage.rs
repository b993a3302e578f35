//! Pipeline stage definitions
//!
//! The crawl runs four stages in strict order; each stage consumes the
//! persisted output of the previous one.

use std::fmt;

/// One of the four sequential crawl stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Discover category URLs from the storefront navigation
    Categories,

    /// Enumerate the listing pages of every category
    Pages,

    /// Collect article links from every listing page
    Articles,

    /// Fetch and extract the detail fields of every article
    ArticleData,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [
        Stage::Categories,
        Stage::Pages,
        Stage::Articles,
        Stage::ArticleData,
    ];

    /// Total number of stages, used in progress lines such as `[2/4]`
    pub const COUNT: usize = 4;

    /// 1-based position of the stage in the pipeline
    pub fn number(&self) -> u8 {
        match self {
            Self::Categories => 1,
            Self::Pages => 2,
            Self::Articles => 3,
            Self::ArticleData => 4,
        }
    }

    /// Looks up a stage by its 1-based position
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// Human readable description used in progress reporting
    pub fn description(&self) -> &'static str {
        match self {
            Self::Categories => "Getting categories URLs",
            Self::Pages => "Getting pages URLs",
            Self::Articles => "Getting articles URLs",
            Self::ArticleData => "Getting articles data",
        }
    }

    /// Converts the stage to its database representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Pages => "pages",
            Self::Articles => "articles",
            Self::ArticleData => "articles_data",
        }
    }

    /// Parses a stage from its database representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "categories" => Some(Self::Categories),
            "pages" => Some(Self::Pages),
            "articles" => Some(Self::Articles),
            "articles_data" => Some(Self::ArticleData),
            _ => None,
        }
    }

    /// The stage that follows this one, if any
    pub fn next(&self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.number(), Self::COUNT)
    }
}

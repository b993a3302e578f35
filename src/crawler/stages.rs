//! The four crawl stages
//!
//! Each stage fans its input out over a `JoinSet`, one task per item. Tasks
//! fetch through the shared `Fetcher` (which caps concurrency), parse with the
//! `SiteExtractor`, and hand their output to the sink. A stage returns once
//! every task has been joined; flushing the sink is left to the coordinator.

use crate::config::{CategoryEntry, Config, PaginationStrategy};
use crate::crawler::fetcher::{FetchError, Fetcher, Transport};
use crate::extract::{generate_page_urls, SiteExtractor};
use crate::model::{Article, Category, FailedItem, Page, Stage};
use crate::storage::{SinkHandle, WriteOp};
use crate::url::parse_absolute;
use crate::HarvestError;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use url::Url;

/// Shared handles every stage task needs
pub struct StageContext<E, T> {
    pub config: Arc<Config>,
    pub fetcher: Arc<Fetcher<T>>,
    pub extractor: Arc<E>,
    pub sink: SinkHandle,
}

impl<E, T> Clone for StageContext<E, T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            sink: self.sink.clone(),
        }
    }
}

/// Per-stage success and failure counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl StageTally {
    fn record(&mut self, outcome: ItemOutcome) {
        self.attempted += 1;
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Succeeded,
    Failed,
}

/// Runs one task per item and waits for all of them
async fn fan_out<I, F, Fut>(items: Vec<I>, task: F) -> StageTally
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = ItemOutcome> + Send + 'static,
{
    let mut set = JoinSet::new();
    for item in items {
        set.spawn(task(item));
    }

    let mut tally = StageTally::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => tally.record(outcome),
            Err(e) => {
                tracing::error!("Stage task aborted: {}", e);
                tally.record(ItemOutcome::Failed);
            }
        }
    }
    tally
}

/// Queues a write, logging instead of failing if the writer is gone
async fn submit(sink: &SinkHandle, op: WriteOp) -> ItemOutcome {
    match sink.write(op).await {
        Ok(()) => ItemOutcome::Succeeded,
        Err(e) => {
            tracing::error!("{}", e);
            ItemOutcome::Failed
        }
    }
}

/// Logs a terminal fetch failure and records it for later re-runs
async fn fail(sink: &SinkHandle, stage: Stage, item_id: Option<i64>, error: FetchError) -> ItemOutcome {
    if error.is_cancelled() {
        return ItemOutcome::Failed;
    }

    tracing::warn!("{} {}", stage, error);
    let item = FailedItem {
        stage,
        url: error.url,
        item_id,
        attempts: error.attempts,
        error: error.cause.to_string(),
        failed_at: Utc::now().to_rfc3339(),
    };
    submit(sink, WriteOp::Failure(item)).await;
    ItemOutcome::Failed
}

async fn resolve(sink: &SinkHandle, stage: Stage, url: &str) -> ItemOutcome {
    submit(
        sink,
        WriteOp::Resolved {
            stage,
            url: url.to_string(),
        },
    )
    .await
}

fn parse_item_url(stage: Stage, url: &str) -> Option<Url> {
    match Url::parse(url) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("{} Skipping malformed URL {}: {}", stage, url, e);
            None
        }
    }
}

// ===== Stage 1 =====

/// Navigation pages scanned for category links: the base URL plus any
/// configured root paths
pub fn root_pages(config: &Config) -> Result<Vec<Url>, HarvestError> {
    let base = parse_absolute(&config.site.base_url)?;
    let mut roots = vec![base.clone()];
    for path in &config.site.root_paths {
        let root = base.join(path)?;
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    Ok(roots)
}

/// Stage 1: discovers categories from the navigation pages
///
/// Returns the de-duplicated categories (including configured extras) that
/// were handed to the sink.
pub async fn discover_categories<E, T>(
    ctx: &StageContext<E, T>,
) -> Result<(Vec<Category>, StageTally), HarvestError>
where
    E: SiteExtractor,
    T: Transport,
{
    let roots = root_pages(&ctx.config)?;

    let mut set = JoinSet::new();
    for root in roots {
        let ctx = ctx.clone();
        set.spawn(async move {
            match ctx.fetcher.fetch(root.as_str()).await {
                Ok(html) => {
                    let found = ctx.extractor.categories(&html, &root);
                    tracing::debug!("Found {} categories on {}", found.len(), root);
                    resolve(&ctx.sink, Stage::Categories, root.as_str()).await;
                    Some(found)
                }
                Err(e) => {
                    fail(&ctx.sink, Stage::Categories, None, e).await;
                    None
                }
            }
        });
    }

    let mut tally = StageTally::default();
    let mut by_id: BTreeMap<i64, Category> = BTreeMap::new();
    let mut seen_urls = HashSet::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Some(found)) => {
                tally.record(ItemOutcome::Succeeded);
                for category in found {
                    if seen_urls.insert(category.url.clone()) {
                        by_id.entry(category.id).or_insert(category);
                    }
                }
            }
            Ok(None) => tally.record(ItemOutcome::Failed),
            Err(e) => {
                tracing::error!("Stage task aborted: {}", e);
                tally.record(ItemOutcome::Failed);
            }
        }
    }

    merge_extra_categories(&mut by_id, &ctx.config.extra_categories);

    let categories: Vec<Category> = by_id.into_values().collect();
    if !categories.is_empty() {
        ctx.sink
            .write(WriteOp::Categories(categories.clone()))
            .await?;
    }

    Ok((categories, tally))
}

/// Adds the configured categories; a configured entry replaces a discovered
/// category with the same id
fn merge_extra_categories(by_id: &mut BTreeMap<i64, Category>, extras: &[CategoryEntry]) {
    for extra in extras {
        by_id.insert(
            extra.id,
            Category {
                id: extra.id,
                url: extra.url.clone(),
            },
        );
    }
}

// ===== Stage 2 =====

/// Stage 2: enumerates the listing pages of every category
pub async fn enumerate_pages<E, T>(ctx: &StageContext<E, T>, categories: Vec<Category>) -> StageTally
where
    E: SiteExtractor,
    T: Transport,
{
    fan_out(categories, |category| {
        let ctx = ctx.clone();
        async move { enumerate_category(&ctx, category).await }
    })
    .await
}

async fn enumerate_category<E, T>(ctx: &StageContext<E, T>, category: Category) -> ItemOutcome
where
    E: SiteExtractor,
    T: Transport,
{
    let Some(first_url) = parse_item_url(Stage::Pages, &category.url) else {
        return ItemOutcome::Failed;
    };

    let html = match ctx.fetcher.fetch(first_url.as_str()).await {
        Ok(html) => html,
        Err(e) => return fail(&ctx.sink, Stage::Pages, Some(category.id), e).await,
    };

    let pagination = ctx.extractor.pagination(&html, &first_url);
    let settings = &ctx.config.site.pagination;

    let (urls, complete) = match settings.strategy {
        PaginationStrategy::ProductCount => {
            let total_pages = match pagination.counter {
                Some(counter) => counter.total_pages(),
                None => u64::from(pagination.has_articles),
            };
            (generate_page_urls(&first_url, total_pages, settings), true)
        }
        PaginationStrategy::NextLink => {
            if pagination.has_articles {
                follow_next_links(ctx, first_url.clone(), pagination.next_url).await
            } else {
                (Vec::new(), true)
            }
        }
    };

    if urls.is_empty() {
        tracing::debug!("Category {} has no products", category.id);
    }

    let pages = urls
        .into_iter()
        .zip(1u32..)
        .map(|(url, page_index)| Page {
            category_id: category.id,
            url: url.to_string(),
            page_index,
        })
        .collect();

    let outcome = submit(
        &ctx.sink,
        WriteOp::Pages {
            category_id: category.id,
            pages,
            complete,
        },
    )
    .await;
    resolve(&ctx.sink, Stage::Pages, first_url.as_str()).await;
    outcome
}

/// Walks `rel="next"` links from the first page, bounded by `max-pages`
///
/// Returns the pages found and whether the walk reached its end. A page that
/// cannot be fetched stops the walk early; the pages found so far are kept.
async fn follow_next_links<E, T>(
    ctx: &StageContext<E, T>,
    first_url: Url,
    mut next: Option<Url>,
) -> (Vec<Url>, bool)
where
    E: SiteExtractor,
    T: Transport,
{
    let max_pages = ctx.config.site.pagination.max_pages as usize;
    let mut urls = vec![first_url];

    while let Some(url) = next.take() {
        if urls.len() >= max_pages || urls.contains(&url) {
            break;
        }
        match ctx.fetcher.fetch(url.as_str()).await {
            Ok(html) => {
                next = ctx.extractor.pagination(&html, &url).next_url;
                resolve(&ctx.sink, Stage::Pages, url.as_str()).await;
                urls.push(url);
            }
            Err(e) => {
                fail(&ctx.sink, Stage::Pages, None, e).await;
                return (urls, false);
            }
        }
    }

    (urls, true)
}

// ===== Stage 3 =====

/// Stage 3: collects article links from every listing page
pub async fn collect_articles<E, T>(ctx: &StageContext<E, T>, pages: Vec<Page>) -> StageTally
where
    E: SiteExtractor,
    T: Transport,
{
    let seen: Arc<Mutex<HashSet<(i64, String)>>> = Arc::default();

    fan_out(pages, |page| {
        let ctx = ctx.clone();
        let seen = Arc::clone(&seen);
        async move { collect_page(&ctx, page, &seen).await }
    })
    .await
}

async fn collect_page<E, T>(
    ctx: &StageContext<E, T>,
    page: Page,
    seen: &Mutex<HashSet<(i64, String)>>,
) -> ItemOutcome
where
    E: SiteExtractor,
    T: Transport,
{
    let Some(page_url) = parse_item_url(Stage::Articles, &page.url) else {
        return ItemOutcome::Failed;
    };

    let html = match ctx.fetcher.fetch(page_url.as_str()).await {
        Ok(html) => html,
        Err(e) => return fail(&ctx.sink, Stage::Articles, Some(page.category_id), e).await,
    };

    let found = ctx.extractor.articles(&html, &page_url);
    let fresh: Vec<Article> = {
        let mut seen = seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        found
            .into_iter()
            .filter(|article| seen.insert((article.id, article.url.clone())))
            .collect()
    };

    let outcome = if fresh.is_empty() {
        ItemOutcome::Succeeded
    } else {
        submit(&ctx.sink, WriteOp::Articles(fresh)).await
    };
    resolve(&ctx.sink, Stage::Articles, page_url.as_str()).await;
    outcome
}

// ===== Stage 4 =====

/// Stage 4: extracts the detail fields of every article
pub async fn extract_article_data<E, T>(ctx: &StageContext<E, T>, articles: Vec<Article>) -> StageTally
where
    E: SiteExtractor,
    T: Transport,
{
    fan_out(articles, |article| {
        let ctx = ctx.clone();
        async move { extract_article(&ctx, article).await }
    })
    .await
}

async fn extract_article<E, T>(ctx: &StageContext<E, T>, article: Article) -> ItemOutcome
where
    E: SiteExtractor,
    T: Transport,
{
    let Some(article_url) = parse_item_url(Stage::ArticleData, &article.url) else {
        return ItemOutcome::Failed;
    };

    let html = match ctx.fetcher.fetch(article_url.as_str()).await {
        Ok(html) => html,
        Err(e) => return fail(&ctx.sink, Stage::ArticleData, Some(article.id), e).await,
    };

    let data = ctx
        .extractor
        .article_detail(&html, &article_url)
        .into_data(&article);

    let missing = data.missing_fields();
    if !missing.is_empty() {
        tracing::warn!(
            "Article {} ({}) is missing: {}",
            article.id,
            article.url,
            missing.join(", ")
        );
    }

    let outcome = submit(&ctx.sink, WriteOp::ArticleData(vec![data])).await;
    resolve(&ctx.sink, Stage::ArticleData, article_url.as_str()).await;
    outcome
}

//! Crawler coordinator - pipeline orchestration
//!
//! This module runs the stages in order and enforces the barrier between
//! them:
//! - Opening the database and recording the run
//! - Spawning the single writer task
//! - Loading each stage's input from the previous stage's persisted output
//! - Joining every stage task and flushing the sink before moving on
//! - Aborting when no categories are discovered or the run is cancelled

use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, HttpTransport, Transport};
use crate::crawler::stages::{
    collect_articles, discover_categories, enumerate_pages, extract_article_data, StageContext,
    StageTally,
};
use crate::extract::{SiteExtractor, StorefrontExtractor};
use crate::model::{Article, RunStatus, Stage};
use crate::storage::{self, SinkWriter, SqliteStorage, Storage, WriteReport};
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Which stages run and where their input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// First stage to run; earlier stages' output is read from the database
    pub first_stage: Stage,

    /// Stage 4 only fetches articles that have no detail row yet
    pub only_missing: bool,

    /// Only re-fetch the articles recorded as failed by earlier runs
    pub retry_failed: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            first_stage: Stage::Categories,
            only_missing: false,
            retry_failed: false,
        }
    }
}

impl RunOptions {
    /// Options for re-fetching failed articles only
    pub fn retry_failed() -> Self {
        Self {
            first_stage: Stage::ArticleData,
            only_missing: false,
            retry_failed: true,
        }
    }

    /// The stages this run executes, in order
    pub fn stages(&self) -> Vec<Stage> {
        if self.retry_failed {
            return vec![Stage::ArticleData];
        }
        Stage::ALL
            .into_iter()
            .filter(|stage| *stage >= self.first_stage)
            .collect()
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub tally: StageTally,
    pub write: WriteReport,
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    /// Items that failed across all stages
    pub fn failed_items(&self) -> usize {
        self.stages.iter().map(|report| report.tally.failed).sum()
    }

    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }
}

/// Main pipeline coordinator
pub struct Coordinator<E = StorefrontExtractor, T = HttpTransport> {
    config: Arc<Config>,
    config_hash: String,
    fetcher: Arc<Fetcher<T>>,
    extractor: Arc<E>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator that crawls over HTTP with the storefront extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration, stored with the run
    /// * `cancel` - Token that stops the run when cancelled
    pub fn new(
        config: Config,
        config_hash: String,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::from_config(&config.site, &config.fetcher, cancel.clone())?;
        Ok(Self::with_parts(
            config,
            config_hash,
            fetcher,
            StorefrontExtractor::new(),
            cancel,
        ))
    }
}

impl<E: SiteExtractor, T: Transport> Coordinator<E, T> {
    /// Creates a coordinator from explicit parts
    pub fn with_parts(
        config: Config,
        config_hash: String,
        fetcher: Fetcher<T>,
        extractor: E,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_hash,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            cancel,
        }
    }

    fn database_path(&self) -> &Path {
        Path::new(&self.config.output.database_path)
    }

    /// Runs the selected stages
    ///
    /// The run is recorded in the `runs` table and marked completed or
    /// failed. Per-item failures do not fail the run.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, HarvestError> {
        let stages = options.stages();
        let first_stage = stages.first().copied().unwrap_or(Stage::Categories);
        let start_time = Instant::now();

        let mut storage = SqliteStorage::new(self.database_path())?;
        let run_id = storage.create_run(&self.config_hash, first_stage)?;
        tracing::info!(
            "Starting run {} from stage {} ({})",
            run_id,
            first_stage.number(),
            self.config.output.database_path
        );

        let (sink, writer) = SinkWriter::spawn(storage, self.config.pipeline.write_batch_size);
        let ctx = StageContext {
            config: Arc::clone(&self.config),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            sink,
        };

        let result = self.run_stages(&ctx, &options, &stages).await;

        // Dropping the last handle lets the writer drain and hand the storage back
        drop(ctx);
        let mut storage = writer.finish().await?;

        let status = match &result {
            Ok(_) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        };
        storage.finish_run(run_id, status)?;

        let reports = result?;
        let summary = RunSummary {
            run_id,
            stages: reports,
        };
        tracing::info!(
            "Run {} finished in {:.1}s with {} failed items",
            run_id,
            start_time.elapsed().as_secs_f64(),
            summary.failed_items()
        );
        Ok(summary)
    }

    async fn run_stages(
        &self,
        ctx: &StageContext<E, T>,
        options: &RunOptions,
        stages: &[Stage],
    ) -> Result<Vec<StageReport>, HarvestError> {
        let mut reports = Vec::with_capacity(stages.len());

        for &stage in stages {
            if self.cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            tracing::info!("{} {}...", stage, stage.description());

            let tally = match stage {
                Stage::Categories => {
                    let (categories, tally) = discover_categories(ctx).await?;
                    if categories.is_empty() {
                        ctx.sink.flush().await?;
                        return Err(HarvestError::NoCategories {
                            base_url: self.config.site.base_url.clone(),
                        });
                    }
                    tally
                }
                Stage::Pages => {
                    let categories = storage::categories(self.database_path())?;
                    enumerate_pages(ctx, categories).await
                }
                Stage::Articles => {
                    let pages = storage::pages(self.database_path())?;
                    collect_articles(ctx, pages).await
                }
                Stage::ArticleData => {
                    let articles = self.article_inputs(options)?;
                    extract_article_data(ctx, articles).await
                }
            };

            // Barrier: the next stage reads what this one wrote
            let write = ctx.sink.flush().await?;
            if self.cancel.is_cancelled() {
                tracing::warn!("{} Cancelled after {} items", stage, tally.attempted);
                return Err(HarvestError::Cancelled);
            }

            log_stage(stage, &tally, &write);
            reports.push(StageReport {
                stage,
                tally,
                write,
            });
        }

        Ok(reports)
    }

    fn article_inputs(&self, options: &RunOptions) -> Result<Vec<Article>, HarvestError> {
        let reader = SqliteStorage::new(self.database_path())?;

        let articles = if options.retry_failed {
            reader
                .failures(Some(Stage::ArticleData))?
                .into_iter()
                .filter_map(|item| {
                    item.item_id.map(|id| Article { id, url: item.url })
                })
                .collect()
        } else if options.only_missing {
            reader.articles_without_data()?
        } else {
            reader.articles()?
        };

        tracing::debug!("Stage 4 input: {} articles", articles.len());
        Ok(articles)
    }
}

fn log_stage(stage: Stage, tally: &StageTally, write: &WriteReport) {
    if tally.failed == 0 {
        tracing::info!(
            "{} Done: {} requests, {} rows written",
            stage,
            tally.attempted,
            write.rows_written
        );
    } else {
        tracing::warn!(
            "{} Done: {} of {} requests failed, {} rows written",
            stage,
            tally.failed,
            tally.attempted,
            write.rows_written
        );
    }

    if write.ops_lost > 0 {
        tracing::error!("{} {} writes could not be persisted", stage, write.ops_lost);
    }
}

/// Runs the pipeline over HTTP with the default extractor
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration, stored with the run
/// * `options` - Which stages to run and how stage 4 selects its input
/// * `cancel` - Token that stops the run when cancelled
pub async fn run_pipeline(
    config: Config,
    config_hash: String,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash, cancel)?;
    coordinator.run(options).await
}

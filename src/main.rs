//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest crawler.

use anyhow::Context;
use catalog_harvest::config::{load_config_unvalidated, load_config_with_hash, Config};
use catalog_harvest::crawler::{root_pages, run_pipeline, RunOptions};
use catalog_harvest::output::{
    export_table, load_statistics, print_statistics, ExportFormat, OutputError,
};
use catalog_harvest::storage::{SqliteStorage, Storage, Table};
use catalog_harvest::Stage;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a staged product catalog crawler
///
/// Crawls a storefront in four stages (categories, listing pages, article
/// links, article details) and stores every stage in a SQLite database.
/// Settings come from an optional TOML file and the environment
/// (BASE_URL, CONCURRENCY_LIMIT, BACKOFF_FACTOR, MAX_RETRIES, ...).
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A staged product catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export a table (categories, pages, articles, articles_data,
    /// failed_items, runs) and exit
    #[arg(long, value_name = "TABLE")]
    export: Option<String>,

    /// Export format
    #[arg(long, value_enum, default_value = "csv")]
    format: FormatArg,

    /// Export destination (stdout if omitted)
    #[arg(short, long, value_name = "FILE", requires = "export")]
    output: Option<PathBuf>,

    /// Start at this stage, reading earlier stages from the database
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=4))]
    from_stage: Option<u8>,

    /// Only fetch details of articles that have none yet
    #[arg(long)]
    only_missing: bool,

    /// Only re-fetch article details that failed in earlier runs
    #[arg(long, conflicts_with_all = ["from_stage", "only_missing"])]
    retry_failed: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Jsonl,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Jsonl => ExportFormat::JsonLines,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if cli.stats {
        let config = load_config_unvalidated(cli.config.as_deref())?;
        return handle_stats(&config);
    }
    if let Some(table) = &cli.export {
        let config = load_config_unvalidated(cli.config.as_deref())?;
        return handle_export(&config, table, cli.format.into(), cli.output.as_deref());
    }

    // Load and validate configuration
    let (config, config_hash) = match load_config_with_hash(cli.config.as_deref()) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let options = run_options(&cli);

    if cli.dry_run {
        handle_dry_run(&config, &options)
    } else {
        handle_crawl(config, config_hash, options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn run_options(cli: &Cli) -> RunOptions {
    if cli.retry_failed {
        return RunOptions::retry_failed();
    }
    RunOptions {
        first_stage: cli
            .from_stage
            .and_then(Stage::from_number)
            .unwrap_or(Stage::Categories),
        only_missing: cli.only_missing,
        retry_failed: false,
    }
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, options: &RunOptions) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  User agent: {}", config.site.user_agent);
    println!(
        "  Pagination: {:?} (param '{}', max {} pages)",
        config.site.pagination.strategy,
        config.site.pagination.page_param,
        config.site.pagination.max_pages
    );

    println!("\nFetcher:");
    println!("  Concurrency limit: {}", config.fetcher.concurrency_limit);
    println!("  Max attempts: {}", config.fetcher.max_retries);
    println!("  Backoff factor: {}s", config.fetcher.backoff_factor);
    println!("  Request timeout: {}s", config.fetcher.request_timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Write batch size: {}", config.pipeline.write_batch_size);

    let roots = root_pages(config)?;
    println!("\nRoot Pages ({}):", roots.len());
    for root in &roots {
        println!("  - {}", root);
    }

    println!("\nExtra Categories ({}):", config.extra_categories.len());
    for entry in &config.extra_categories {
        println!("  - {} {}", entry.id, entry.url);
    }

    println!("\nStages:");
    for stage in options.stages() {
        println!("  {} {}", stage, stage.description());
    }
    if options.only_missing {
        println!("  (stage 4 limited to articles without details)");
    }
    if options.retry_failed {
        println!("  (stage 4 limited to previously failed articles)");
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes one table as CSV or JSON lines
fn handle_export(
    config: &Config,
    table: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let table = Table::from_name(table).ok_or_else(|| OutputError::UnknownTable(table.to_string()))?;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open {}", config.output.database_path))?;
    let data = storage.load_table(table)?;

    let rows = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export_table(&data, format, BufWriter::new(file))?
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let rows = export_table(&data, format, &mut lock)?;
            lock.flush()?;
            rows
        }
    };

    tracing::info!("Exported {} rows from {}", rows, table);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    options: RunOptions,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after in-flight requests");
                cancel.cancel();
            }
        });
    }

    tracing::info!(
        "Crawling {} with up to {} concurrent requests",
        config.site.base_url,
        config.fetcher.concurrency_limit
    );

    match run_pipeline(config, config_hash, options, cancel).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl completed: run {} with {} failed items",
                summary.run_id,
                summary.failed_items()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

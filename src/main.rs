//! Pagekeep main entry point
//!
//! This is the command-line interface for the Pagekeep reading library.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pagekeep::config::{load_config_with_hash, Config};
use pagekeep::ingest::{
    reconcile_stale_items, BatchOrchestrator, ContentExtractor, FirecrawlExtractor, ProgressStatus,
};
use pagekeep::output::{format_item_details, format_item_line, load_statistics, print_statistics};
use pagekeep::storage::{open_storage, ItemFilter, SqliteStorage, Storage};
use pagekeep::{BatchSummary, ItemStatus};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Pagekeep: save web pages for later reading
///
/// Pagekeep extracts the readable content of the pages you save and keeps it in a local
/// library, one URL at a time or in bulk.
#[derive(Parser, Debug)]
#[command(name = "pagekeep")]
#[command(version = "1.0.0")]
#[command(about = "A save-for-later reading library", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Library owner the command acts for
    #[arg(long)]
    owner: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a single URL
    Import {
        /// The URL to save
        url: String,
    },

    /// Save many URLs, reporting progress as each one finishes
    Bulk {
        /// URLs to save, in order
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        urls: Vec<String>,

        /// Read URLs from a file, one per line
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Print progress as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List saved items, newest first
    List {
        /// Only show items in this status
        #[arg(long, value_parser = parse_status)]
        status: Option<ItemStatus>,

        /// Only show items whose title or tags contain this text
        #[arg(long)]
        query: Option<String>,
    },

    /// Show one saved item
    Show {
        /// Item id
        id: Uuid,
    },

    /// Show library statistics
    Stats,

    /// Mark items abandoned by earlier bulk imports as failed
    Reconcile,
}

fn parse_status(s: &str) -> Result<ItemStatus, String> {
    ItemStatus::from_db_string(s).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected one of: pending, processing, completed, failed)",
            s
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Import { url } => handle_import(&config, &config_hash, &cli.owner, &url).await,
        Command::Bulk { urls, file, json } => {
            let urls = match file {
                Some(path) => read_url_file(&path)?,
                None => urls,
            };
            handle_bulk(&config, &config_hash, &cli.owner, urls, json).await
        }
        Command::List { status, query } => handle_list(&config, &cli.owner, status, query),
        Command::Show { id } => handle_show(&config, &cli.owner, id),
        Command::Stats => handle_stats(&config, &cli.owner),
        Command::Reconcile => handle_reconcile(&config, &cli.owner),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagekeep=info,warn"),
            1 => EnvFilter::new("pagekeep=debug,info"),
            2 => EnvFilter::new("pagekeep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads a URL list, skipping blank lines and `#` comments
fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {}", path.display()))?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn open_library(config: &Config) -> anyhow::Result<SqliteStorage> {
    open_storage(Path::new(&config.storage.database_path)).with_context(|| {
        format!(
            "Failed to open database {}",
            config.storage.database_path
        )
    })
}

fn build_orchestrator(
    config: &Config,
    config_hash: &str,
) -> anyhow::Result<BatchOrchestrator<SqliteStorage>> {
    let storage = open_library(config)?;
    let extractor: Arc<dyn ContentExtractor> =
        Arc::new(FirecrawlExtractor::from_config(config.extraction.clone())?);

    Ok(
        BatchOrchestrator::new(Arc::new(Mutex::new(storage)), extractor, config.batch.clone())
            .with_config_hash(config_hash),
    )
}

/// Handles `import`: saves one URL and prints the stored item
async fn handle_import(
    config: &Config,
    config_hash: &str,
    owner: &str,
    url: &str,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, config_hash)?;
    let item = orchestrator.import_url(url, owner).await?;

    println!("{}", format_item_line(&item));
    if item.status != ItemStatus::Completed {
        bail!("Import of {} failed", url);
    }
    Ok(())
}

/// Handles `bulk`: runs a batch and prints one line per finished URL
async fn handle_bulk(
    config: &Config,
    config_hash: &str,
    owner: &str,
    urls: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, config_hash)?;
    let mut stream = orchestrator.run_batch(urls, owner).await?;
    tracing::info!("Batch {} started with {} URLs", stream.batch_id(), stream.total());

    let mut summary = BatchSummary::default();
    let mut interrupted = false;

    loop {
        let snapshot = tokio::select! {
            next = stream.next() => next,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                tracing::warn!("Interrupted, cancelling the batch");
                stream.cancel();
                interrupted = true;
                continue;
            }
        };

        let Some(snapshot) = snapshot else { break };
        summary.record(&snapshot);

        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            let marker = match snapshot.status {
                ProgressStatus::Success => "ok",
                ProgressStatus::Failed => "FAILED",
            };
            println!(
                "[{}/{}] {:<6} {}",
                snapshot.completed, snapshot.total, marker, snapshot.url
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("\n{}", summary.message());
    }

    if interrupted {
        bail!("Bulk import was cancelled");
    }
    Ok(())
}

/// Handles `list`: prints matching items newest first
fn handle_list(
    config: &Config,
    owner: &str,
    status: Option<ItemStatus>,
    query: Option<String>,
) -> anyhow::Result<()> {
    let storage = open_library(config)?;
    let items = storage.list_items(owner, &ItemFilter { status, query })?;

    if items.is_empty() {
        println!("No items found");
        return Ok(());
    }

    for item in &items {
        println!("{}", format_item_line(item));
    }
    Ok(())
}

/// Handles `show`: prints every field of one item
fn handle_show(config: &Config, owner: &str, id: Uuid) -> anyhow::Result<()> {
    let storage = open_library(config)?;
    let item = storage.get_item(id, owner)?;
    print!("{}", format_item_details(&item));
    Ok(())
}

/// Handles `stats`: shows status counts for the owner's library
fn handle_stats(config: &Config, owner: &str) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_library(config)?;
    let stats = load_statistics(&storage, owner)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles `reconcile`: resolves items left unfinished by earlier runs
fn handle_reconcile(config: &Config, owner: &str) -> anyhow::Result<()> {
    let mut storage = open_library(config)?;
    let cutoff = config.batch.stale_cutoff(Utc::now());
    let resolved = reconcile_stale_items(&mut storage, owner, cutoff)?;

    for item in &resolved {
        println!("{}", format_item_line(item));
    }
    println!("Marked {} stale items as failed", resolved.len());
    Ok(())
}

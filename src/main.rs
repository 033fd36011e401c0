//! Sociograph main entry point
//!
//! This is the command-line interface for the Sociograph crawler.

use anyhow::Context;
use clap::Parser;
use sociograph::config::{load_config_with_hash, validate_screen_name, Config};
use sociograph::crawler::crawl;
use sociograph::{SqliteStorage, TwitterClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sociograph: a quota-aware social graph crawler
///
/// Crawls profiles, follow relationships and statuses from the remote API
/// into SQLite, backing off per crawl stage whenever a rate limit is hit.
/// Runs until interrupted with Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "sociograph")]
#[command(version)]
#[command(about = "A quota-aware social graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Create the database file and schema before crawling
    #[arg(short, long)]
    init: bool,

    /// Extra screen name to seed on the profile unit (repeatable)
    #[arg(long = "seed", value_name = "SCREEN_NAME")]
    seeds: Vec<String>,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let storage = prepare(&config, &cli)?;

    if cli.stats {
        handle_stats(&config, &storage)?;
        return Ok(());
    }

    handle_crawl(config, storage, &cli.seeds).await?;
    Ok(())
}

/// Validates command-line seeds and opens (or with `--init`, creates) storage
fn prepare(config: &Config, cli: &Cli) -> sociograph::Result<SqliteStorage> {
    for seed in &cli.seeds {
        validate_screen_name(seed)?;
    }

    let db_path = Path::new(&config.output.database_path);
    let storage = if cli.init {
        SqliteStorage::create(db_path)?
    } else {
        SqliteStorage::open(db_path)?
    };

    Ok(storage)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sociograph=info,warn"),
            1 => EnvFilter::new("sociograph=debug,info"),
            2 => EnvFilter::new("sociograph=trace,debug"),
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

/// Handles the --stats mode: shows row counts from the database
fn handle_stats(config: &Config, storage: &SqliteStorage) -> sociograph::Result<()> {
    let stats = storage.stats()?;

    println!("Database: {}\n", config.output.database_path);
    println!("  Users:           {}", stats.users);
    println!("  Profiled users:  {}", stats.profiled_users);
    println!("  Statuses:        {}", stats.statuses);
    println!("  Follow edges:    {}", stats.follows);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    storage: SqliteStorage,
    extra_seeds: &[String],
) -> sociograph::Result<()> {
    let seed_count = config.seeds.total() + extra_seeds.len();
    if seed_count == 0 {
        tracing::warn!("No seeds configured; units will idle until stopped");
    } else {
        tracing::info!("Total seeds: {}", seed_count);
    }

    let api = Arc::new(TwitterClient::new(&config)?);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping units");
                trigger.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    crawl(&config, api, Arc::new(storage), extra_seeds, cancel).await;

    tracing::info!("Crawler stopped");
    Ok(())
}

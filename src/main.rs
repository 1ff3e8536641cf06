//! Samovar main entry point
//!
//! Command-line interface for the dual-worker recipe harvester. The
//! `collect` and `fetch` subcommands are two independent long-lived
//! processes that share nothing but the work-queue database.

use clap::{Parser, Subcommand};
use samovar::collector::LinkCollector;
use samovar::fetcher::Fetcher;
use samovar::queue::{QueueStore, SqliteQueue};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Samovar: a dual-worker recipe harvester
#[derive(Parser, Debug)]
#[command(name = "samovar")]
#[command(version = "1.0.0")]
#[command(about = "A dual-worker recipe harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover recipe URLs by walking the search listing
    Collect {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Drain the queue: fetch recipe pages and export records
    Fetch {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Show queue status counts and exit
    Stats {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config_path = match &cli.command {
        Command::Collect { config } | Command::Fetch { config } | Command::Stats { config } => {
            config.clone()
        }
    };

    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, _config_hash) = match samovar::config::load_config_with_hash(&config_path) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Collect { .. } => handle_collect(config).await?,
        Command::Fetch { .. } => handle_fetch(config).await?,
        Command::Stats { .. } => handle_stats(&config)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("samovar=info,warn"),
            1 => EnvFilter::new("samovar=debug,info"),
            2 => EnvFilter::new("samovar=trace,debug"),
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

/// Opens the queue database; a failure here is fatal (no queue, no pipeline)
fn open_queue(config: &samovar::Config) -> Result<Arc<Mutex<SqliteQueue>>, Box<dyn std::error::Error>> {
    let store = SqliteQueue::open(Path::new(&config.queue.database_path))?;
    Ok(Arc::new(Mutex::new(store)))
}

/// Handles the `collect` subcommand: runs link discovery to exhaustion
async fn handle_collect(config: samovar::Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_queue(&config)?;
    let mut collector = LinkCollector::new(config, Arc::clone(&store))?;

    collector.run().await?;

    let counts = store.lock().unwrap().status_counts()?;
    tracing::info!(
        "Discovery finished: {} pending, {} processed, {} failed in queue",
        counts.pending,
        counts.processed,
        counts.failed
    );
    Ok(())
}

/// Handles the `fetch` subcommand: drains the queue until Ctrl-C
async fn handle_fetch(config: samovar::Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_queue(&config)?;
    let mut fetcher = Fetcher::new(config, store)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received stop signal, finishing current batch");
            signal_cancel.cancel();
        }
    });

    fetcher.run(cancel).await?;
    Ok(())
}

/// Handles the `stats` subcommand: prints queue status counts
fn handle_stats(config: &samovar::Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Queue database: {}\n", config.queue.database_path);

    let store = SqliteQueue::open(Path::new(&config.queue.database_path))?;
    let counts = store.status_counts()?;

    println!("Queue status:");
    println!("  pending:   {}", counts.pending);
    println!("  leased:    {}", counts.leased);
    println!("  processed: {}", counts.processed);
    println!("  failed:    {}", counts.failed);
    println!("  total:     {}", counts.total());

    Ok(())
}

//! Runlog main entry point
//!
//! This is the command-line interface for the Runlog workout log harvester.

use anyhow::{bail, Context};
use clap::Parser;
use runlog::config::{load_config_with_hash, Config};
use runlog::crawler::{run_export, ResetScope, RunOptions};
use runlog::output::StateStatus;
use runlog::StateStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runlog: a resumable workout log harvester
///
/// Runlog walks an athlete's paginated workout listing, exports every
/// workout it has not exported before, and remembers its progress so an
/// interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "runlog")]
#[command(version)]
#[command(about = "A resumable workout log harvester", long_about = None)]
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

    /// Maximum concurrent record exports (overrides the config)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=100))]
    concurrency: Option<u16>,

    /// Re-export everything: clear all completed records and their files
    #[arg(long, conflicts_with_all = ["refresh_ids", "force"])]
    refresh_all: bool,

    /// Re-export only these records (comma-separated identifiers)
    #[arg(long, value_delimiter = ',', value_name = "IDS", conflicts_with = "force")]
    refresh_ids: Vec<u64>,

    /// Start over: forget all discovery and export progress
    #[arg(long)]
    force: bool,

    /// Validate config and show what would run without fetching anything
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show progress from the state file and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

impl Cli {
    fn reset_scope(&self) -> Option<ResetScope> {
        if self.force {
            Some(ResetScope::Everything)
        } else if self.refresh_all {
            Some(ResetScope::AllCompleted)
        } else if !self.refresh_ids.is_empty() {
            Some(ResetScope::Completed(self.refresh_ids.iter().copied().collect()))
        } else {
            None
        }
    }
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
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        Ok(())
    } else if cli.status {
        handle_status(&config);
        Ok(())
    } else {
        handle_export(&config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("runlog=info,warn"),
            1 => EnvFilter::new("runlog=debug,info"),
            2 => EnvFilter::new("runlog=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Runlog Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Entity: {}", config.target.entity_id);
    println!("  Listing: {}", config.target.listing_path);
    println!("  Detail: {}/{{id}}", config.target.detail_path.trim_end_matches('/'));
    println!("  Login path: {}", config.target.login_path);

    println!("\nRate Limits:");
    println!(
        "  Detail pages: {} per {}s",
        config.rate_limit.detail_rate, config.rate_limit.detail_per_secs
    );
    println!(
        "  Listing pages: {} per {}s",
        config.rate_limit.listing_rate, config.rate_limit.listing_per_secs
    );

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms doubling to {}ms, +0-{}ms jitter",
        config.retry.base_delay_ms, config.retry.max_delay_ms, config.retry.jitter_ms
    );

    println!("\nExport:");
    println!(
        "  Concurrency: {}",
        cli.concurrency
            .map(usize::from)
            .unwrap_or(config.export.concurrency)
    );
    println!("  State file: {}", config.state_path().display());
    println!("  Output directory: {}", config.output_dir().display());
    println!("  Source time zone: {}", config.export.source_timezone);
    println!("  Max pages per session: {}", config.export.max_pages_per_session);
    match config.export.max_records_per_session {
        Some(cap) => println!("  Max records per session: {}", cap),
        None => println!("  Max records per session: unlimited"),
    }
    println!(
        "  Session cookie: {}",
        if config.http.cookie.is_some() { "set" } else { "none" }
    );

    match cli.reset_scope() {
        Some(scope) => println!("\nWould apply reset: {:?}", scope),
        None => println!("\nNo reset requested"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --status mode: shows progress from the state file
fn handle_status(config: &Config) {
    let path = config.state_path();
    println!("State file: {}\n", path.display());

    let store = StateStore::load(&path);
    match store.snapshot() {
        Ok(state) => println!("{}", StateStatus::from_state(&state)),
        Err(e) => eprintln!("Failed to read state: {}", e),
    }
}

/// Handles the main export operation
async fn handle_export(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let options = RunOptions {
        reset: cli.reset_scope(),
        concurrency: cli.concurrency.map(usize::from),
    };

    if let Some(scope) = &options.reset {
        tracing::info!("Applying reset before discovery: {:?}", scope);
    }

    let summary = run_export(config, options)
        .await
        .context("Export run failed")?;

    println!("{}", summary);

    if summary.status.is_fatal() {
        bail!("Export aborted: discovery failed");
    }

    Ok(())
}

//! Crawler module for fetching, discovery and export orchestration
//!
//! This module contains the core harvesting logic, including:
//! - Token-bucket rate limiting
//! - HTTP fetching with failure classification and retry
//! - Listing page parsing and pagination-driven discovery
//! - Overall export coordination

mod coordinator;
mod discovery;
mod fetcher;
mod limiter;
mod listing;
mod retry;

pub use coordinator::{Coordinator, RunOptions};
pub use discovery::{Discoverer, DiscoveryError, DiscoveryReport};
pub use fetcher::{build_http_client, FetchError, Fetcher};
pub use limiter::RateLimiter;
pub use listing::{parse_listing, ListingPage};
pub use retry::{classify, RetryDecision, RetryPolicy};

pub use crate::state::ResetScope;

use crate::config::Config;
use crate::output::RunSummary;
use crate::HarvestError;

/// Runs a complete export with the default JSON writer
///
/// This is the main entry point for an export. It will:
/// 1. Load the entity's state
/// 2. Apply any requested reset
/// 3. Discover identifiers from the listing
/// 4. Export every pending record
/// 5. Return the run summary
///
/// # Example
///
/// ```no_run
/// use runlog::config::load_config;
/// use runlog::crawler::{run_export, RunOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("runlog.toml"))?;
/// let summary = run_export(&config, RunOptions::default()).await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub async fn run_export(config: &Config, options: RunOptions) -> Result<RunSummary, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run(options).await
}

//! Runlog: a resumable harvester for paginated workout logs
//!
//! This crate discovers record identifiers by walking a paginated listing,
//! fetches and parses each record's detail page, and persists progress so that
//! interrupted runs pick up where they left off.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Runlog operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] crawler::DiscoveryError),

    #[error("Record parse error: {0}")]
    Parse(#[from] record::RecordParseError),

    #[error("State error: {0}")]
    State(#[from] state::StateError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown time zone: {0}")]
    InvalidTimezone(String),
}

/// Result type alias for Runlog operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RateLimiter};
pub use output::{RunStatus, RunSummary};
pub use record::{Category, Segment, Workout};
pub use state::{PersistentState, StateStore};

//! Configuration module for Runlog
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use runlog::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("runlog.toml")).unwrap();
//! println!("Harvesting entity {}", config.target.entity_id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ExportConfig, HttpConfig, RateLimitConfig, RetryConfig, TargetConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{parse_timezone, validate};

use crate::config::types::{Config, ExportConfig, RateLimitConfig, RetryConfig, TargetConfig};
use crate::ConfigError;
use chrono_tz::Tz;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_export_config(&config.export)?;
    Ok(())
}

/// Resolves an IANA zone name such as `America/New_York`
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|e| ConfigError::InvalidTimezone(format!("'{}': {}", name, e)))
}

/// Validates the remote target
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.entity_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "entity-id cannot be empty".to_string(),
        ));
    }

    // The entity id becomes a directory name
    if !config
        .entity_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "entity-id must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.entity_id
        )));
    }

    for (name, path) in [
        ("listing-path", &config.listing_path),
        ("detail-path", &config.detail_path),
        ("login-path", &config.login_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    if config.entity_param.is_empty() {
        return Err(ConfigError::Validation(
            "entity-param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates rate limiter settings
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.detail_rate < 1 || config.listing_rate < 1 {
        return Err(ConfigError::Validation(format!(
            "rates must be >= 1, got detail-rate={} listing-rate={}",
            config.detail_rate, config.listing_rate
        )));
    }

    let valid_period = |secs: f64| secs.is_finite() && secs > 0.0;
    if !valid_period(config.detail_per_secs) || !valid_period(config.listing_per_secs) {
        return Err(ConfigError::Validation(format!(
            "rate periods must be finite and > 0, got detail-per-secs={} listing-per-secs={}",
            config.detail_per_secs, config.listing_per_secs
        )));
    }

    Ok(())
}

/// Validates retry settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates export settings
fn validate_export_config(config: &ExportConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.max_pages_per_session < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages-per-session must be >= 1, got {}",
            config.max_pages_per_session
        )));
    }

    if config.workspace.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "workspace cannot be empty".to_string(),
        ));
    }

    parse_timezone(&config.source_timezone)?;

    Ok(())
}

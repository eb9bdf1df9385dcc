//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests, including:
//! - Building HTTP clients with the configured identity and timeouts
//! - Following redirects by hand so a bounce to the login page is caught
//! - Classifying every failure and retrying the transient ones
//! - Acquiring a rate-limiter token before every attempt

use crate::config::HttpConfig;
use crate::crawler::limiter::RateLimiter;
use crate::crawler::retry::{classify, RetryDecision, RetryPolicy};
use crate::url::Endpoints;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, LOCATION};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Classified failure of a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials rejected or session expired; never retried
    #[error("Authentication failed for {url} (HTTP {status}): {reason}")]
    Auth {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("HTTP {status} for {url}")]
    Client { url: String, status: u16 },

    #[error("Server error HTTP {status} for {url}")]
    Server { url: String, status: u16 },

    #[error("Rate limited (HTTP 429) for {url}")]
    RateLimited { url: String },

    #[error("Network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        timeout: bool,
    },

    #[error("Redirect error for {url}: {message}")]
    Redirect { url: String, message: String },

    #[error("Unclassified error for {url}: {message}")]
    Unclassified { url: String, message: String },

    /// Retryable failure that persisted through every attempt
    #[error("Giving up on {url} after {attempts} attempts (final): {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// HTTP status behind this failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Client { status, .. } | Self::Server { status, .. } => {
                Some(*status)
            }
            Self::RateLimited { .. } => Some(429),
            Self::Exhausted { last, .. } => last.status(),
            Self::Network { .. } | Self::Redirect { .. } | Self::Unclassified { .. } => None,
        }
    }

    /// Returns true if the session or credentials must be refreshed
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth { .. } => true,
            Self::Exhausted { last, .. } => last.is_auth(),
            _ => false,
        }
    }

    /// Maps a non-success status to its failure class
    fn from_status(url: &Url, status: StatusCode) -> Self {
        let url = url.to_string();
        match status.as_u16() {
            401 | 403 => Self::Auth {
                url,
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("access denied")
                    .to_string(),
            },
            429 => Self::RateLimited { url },
            s if s >= 500 => Self::Server { url, status: s },
            s => Self::Client { url, status: s },
        }
    }

    /// Maps a transport-level reqwest error to its failure class
    fn from_transport(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Network {
                url,
                message: "Request timeout".to_string(),
                timeout: true,
            }
        } else if error.is_connect() || error.is_request() || error.is_body() || error.is_decode()
        {
            Self::Network {
                url,
                message: error.to_string(),
                timeout: false,
            }
        } else {
            Self::Unclassified {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed by the client itself; [`Fetcher`] walks them
/// so that a redirect to the login page can be recognized before it is taken.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Some(cookie) = &config.cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => tracing::warn!("Ignoring invalid session cookie: {}", e),
        }
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, retrying page fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    endpoints: Endpoints,
    max_redirects: usize,
}

impl Fetcher {
    pub fn new(
        client: Client,
        policy: RetryPolicy,
        endpoints: Endpoints,
        max_redirects: usize,
    ) -> Self {
        Self {
            client,
            policy,
            endpoints,
            max_redirects,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetches `url` and returns the page body
    ///
    /// Each attempt first takes a token from `limiter`. Retryable failures
    /// back off per the retry policy; when the attempts run out the last
    /// failure is returned wrapped in [`FetchError::Exhausted`].
    pub async fn fetch(&self, url: &Url, limiter: &RateLimiter) -> Result<String, FetchError> {
        let mut attempt = 1;

        loop {
            limiter.acquire().await;
            let started = std::time::Instant::now();

            let error = match self.fetch_once(url).await {
                Ok(body) => {
                    tracing::debug!(
                        "Fetch complete in {:.1}s for {} ({} bytes)",
                        started.elapsed().as_secs_f64(),
                        url,
                        body.len()
                    );
                    return Ok(body);
                }
                Err(e) => e,
            };

            match classify(&error) {
                RetryDecision::Fail => {
                    tracing::warn!("Not retrying {}: {}", url, error);
                    return Err(error);
                }
                RetryDecision::Retry if !self.policy.allows_retry_after(attempt) => {
                    tracing::warn!(
                        "FAILED after all retries ({} attempts) on {}: {}",
                        attempt,
                        url,
                        error
                    );
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(error),
                    });
                }
                RetryDecision::Retry => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::debug!(
                        "Retrying {} after {:?} (attempt {}/{}): {}",
                        url,
                        delay,
                        attempt,
                        self.policy.max_attempts,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Performs a single attempt, walking redirects by hand
    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let requested_login = self.endpoints.is_login_url(url);
        let mut current = url.clone();
        let mut visited = HashSet::new();
        visited.insert(current.to_string());

        for _ in 0..=self.max_redirects {
            tracing::trace!("GET {}", current);
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| FetchError::from_transport(&current, e))?;

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::Redirect {
                        url: current.to_string(),
                        message: format!("HTTP {} without a Location header", status.as_u16()),
                    })?;

                let next = current.join(location).map_err(|e| FetchError::Redirect {
                    url: current.to_string(),
                    message: format!("Invalid Location '{}': {}", location, e),
                })?;

                if self.endpoints.is_login_url(&next) && !requested_login {
                    tracing::error!(
                        "Redirected to login page ({}) when fetching {}; session expired?",
                        next,
                        url
                    );
                    return Err(FetchError::Auth {
                        url: url.to_string(),
                        status: 401,
                        reason: format!("redirected to login page {}", next),
                    });
                }

                if !visited.insert(next.to_string()) {
                    return Err(FetchError::Redirect {
                        url: url.to_string(),
                        message: format!("Redirect loop detected at {}", next),
                    });
                }

                tracing::warn!("Redirected from {} to {}", current, next);
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::from_status(&current, status));
            }

            return response
                .text()
                .await
                .map_err(|e| FetchError::from_transport(&current, e));
        }

        Err(FetchError::Redirect {
            url: url.to_string(),
            message: format!("More than {} redirects", self.max_redirects),
        })
    }
}

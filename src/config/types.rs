use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Runlog
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// The remote service and the entity whose records are harvested
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Scheme and host of the remote service, e.g. `http://running-log.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Entity (athlete) whose listing is walked
    #[serde(rename = "entity-id")]
    pub entity_id: String,

    /// Path of the paginated listing
    #[serde(rename = "listing-path", default = "default_records_path")]
    pub listing_path: String,

    /// Path prefix of detail pages; the record id is appended as a segment
    #[serde(rename = "detail-path", default = "default_records_path")]
    pub detail_path: String,

    /// Query parameter carrying the entity id
    #[serde(rename = "entity-param", default = "default_entity_param")]
    pub entity_param: String,

    /// Path the service redirects to when the session has expired
    #[serde(rename = "login-path", default = "default_login_path")]
    pub login_path: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (independent of retry backoff)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum redirect hops followed per request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Session cookie sent with every request
    #[serde(default)]
    pub cookie: Option<String>,
}

/// Token-bucket settings for the two request classes
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Detail page fetches allowed per `detail-per-secs`
    #[serde(rename = "detail-rate", default = "default_detail_rate")]
    pub detail_rate: u32,

    #[serde(rename = "detail-per-secs", default = "default_per_secs")]
    pub detail_per_secs: f64,

    /// Listing page fetches allowed per `listing-per-secs`
    #[serde(rename = "listing-rate", default = "default_listing_rate")]
    pub listing_rate: u32,

    #[serde(rename = "listing-per-secs", default = "default_per_secs")]
    pub listing_per_secs: f64,
}

/// Retry and backoff settings
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the uniform random jitter added to every backoff
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Export run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Root directory holding one subdirectory per entity
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Maximum in-flight fetches (listing pages and detail pages alike)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Listing pages fetched per invocation before discovery stops early
    #[serde(rename = "max-pages-per-session", default = "default_max_pages")]
    pub max_pages_per_session: usize,

    /// Records exported per invocation; unlimited when absent
    #[serde(rename = "max-records-per-session", default)]
    pub max_records_per_session: Option<usize>,

    /// IANA zone the site's dates are written in
    #[serde(rename = "source-timezone", default = "default_timezone")]
    pub source_timezone: String,

    /// Write listing pages that yield no identifiers to the debug directory
    #[serde(rename = "save-debug-html", default = "default_true")]
    pub save_debug_html: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
            cookie: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            detail_rate: default_detail_rate(),
            detail_per_secs: default_per_secs(),
            listing_rate: default_listing_rate(),
            listing_per_secs: default_per_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            concurrency: default_concurrency(),
            max_pages_per_session: default_max_pages(),
            max_records_per_session: None,
            source_timezone: default_timezone(),
            save_debug_html: default_true(),
        }
    }
}

impl Config {
    /// Directory holding everything produced for the configured entity
    pub fn entity_dir(&self) -> PathBuf {
        self.export.workspace.join(&self.target.entity_id)
    }

    /// Location of the persisted state document
    pub fn state_path(&self) -> PathBuf {
        self.entity_dir().join("state").join("runlog_state.json")
    }

    /// Directory receiving one artifact per exported record
    pub fn output_dir(&self) -> PathBuf {
        self.entity_dir().join("output")
    }

    /// Directory receiving diagnostic HTML dumps
    pub fn debug_dir(&self) -> PathBuf {
        self.entity_dir().join("debug")
    }
}

fn default_records_path() -> String {
    "/workouts".to_string()
}

fn default_entity_param() -> String {
    "athleteid".to_string()
}

fn default_login_path() -> String {
    "/athlete/login".to_string()
}

fn default_user_agent() -> String {
    format!("runlog/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    10
}

fn default_detail_rate() -> u32 {
    3
}

fn default_listing_rate() -> u32 {
    10
}

fn default_per_secs() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay_ms() -> u64 {
    15_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ms() -> u64 {
    5_000
}

fn default_workspace() -> PathBuf {
    PathBuf::from("./runlog-data")
}

fn default_concurrency() -> usize {
    5
}

fn default_max_pages() -> usize {
    1000
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_true() -> bool {
    true
}

//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/unwrapped/config.toml`
//! (or the file named by `UNWRAPPED_CONFIG`).
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/unwrapped/` (~/.config/unwrapped/)
//! - Data: `$XDG_DATA_HOME/unwrapped/` (~/.local/share/unwrapped/)
//! - State/Logs: `$XDG_STATE_HOME/unwrapped/` (~/.local/state/unwrapped/)
//!
//! A few settings can be overridden from the environment so secrets stay
//! out of the file: `UNWRAPPED_GATEWAY_URL`, `UNWRAPPED_GATEWAY_TOKEN`,
//! `UNWRAPPED_BIND`.

use crate::analytics::StreakPolicy;
use crate::error::{Error, Result};
use crate::history::{RetryPolicy, WalkMode, WalkSettings};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var naming an alternative config file
pub const CONFIG_ENV: &str = "UNWRAPPED_CONFIG";

/// Largest page the platform hands out in one history call
pub const MAX_PAGE_SIZE: usize = 100;

/// Longest fan-out slice accepted (ten years)
pub const MAX_SLICE_HOURS: u64 = 87_600;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// History gateway connection
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Analytics window and walk settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Retry behaviour for history fetches
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Concurrent fan-out settings
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Profile image storage
    #[serde(default)]
    pub profiles: ProfileConfig,

    /// Report cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP front end
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// History gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g., `http://127.0.0.1:9000`)
    pub base_url: Option<String>,

    /// Bearer token for the gateway
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: default_gateway_timeout(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    30
}

/// Analytics window configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Oldest calendar day covered by a report (UTC midnight, exclusive)
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    /// Messages requested per history call
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Sequential or fan-out pagination
    #[serde(default)]
    pub mode: WalkMode,

    /// How month buckets are stitched when computing streaks
    #[serde(default)]
    pub streak: StreakPolicy,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            page_size: default_page_size(),
            mode: WalkMode::default(),
            streak: StreakPolicy::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Start of the analytics window as an instant.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.start_date.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

/// Retry configuration for history fetches
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Retries after the first attempt before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Linear backoff step in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Upper bound on a single rate-limit wait
    #[serde(default = "default_max_rate_limit_wait")]
    pub max_rate_limit_wait_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
            max_rate_limit_wait: Duration::from_secs(self.max_rate_limit_wait_secs),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_max_rate_limit_wait() -> u64 {
    60
}

/// Fan-out configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FanoutConfig {
    /// Workers per batch
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Width of the time slice each worker covers
    #[serde(default = "default_slice_hours")]
    pub slice_hours: u64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            slice_hours: default_slice_hours(),
        }
    }
}

fn default_workers() -> usize {
    16
}

fn default_slice_hours() -> u64 {
    24 * 7
}

/// Profile image storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProfileConfig {
    /// Download and publish channel photos
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for stored images (default: data dir `profiles/`)
    pub dir: Option<PathBuf>,

    /// Prefix for the URLs put into reports
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// Validity of issued URLs
    #[serde(default = "default_ttl_hours")]
    pub url_ttl_hours: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            url_prefix: default_url_prefix(),
            url_ttl_hours: default_ttl_hours(),
        }
    }
}

impl ProfileConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("profiles"))
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_hours * 3600)
    }
}

fn default_url_prefix() -> String {
    "/profiles".to_string()
}

/// Report cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Serve and store reports through the cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite file (default: data dir `reports.db`)
    pub path: Option<PathBuf>,

    /// How long a stored report stays valid
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl CacheConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("reports.db"))
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

fn default_ttl_hours() -> u64 {
    48
}

fn default_true() -> bool {
    true
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,

    /// Also log to stderr
    #[serde(default)]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            console: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from `UNWRAPPED_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            Self::parse_file(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (used by tests)
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("UNWRAPPED_GATEWAY_URL") {
            self.gateway.base_url = Some(url);
        }
        if let Some(token) = lookup("UNWRAPPED_GATEWAY_TOKEN") {
            self.gateway.api_token = Some(token);
        }
        if let Some(bind) = lookup("UNWRAPPED_BIND") {
            self.server.bind = bind;
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        match self.gateway.base_url.as_deref() {
            None | Some("") => {
                return Err(Error::Config(
                    "gateway.base_url is required (config file or UNWRAPPED_GATEWAY_URL)"
                        .to_string(),
                ))
            }
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                return Err(Error::Config(format!(
                    "gateway.base_url must be an http(s) URL, got {:?}",
                    url
                )))
            }
            Some(_) => {}
        }
        if self.analytics.page_size == 0 || self.analytics.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "analytics.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.analytics.window_start() > Utc::now() {
            return Err(Error::Config(
                "analytics.start_date must not be in the future".to_string(),
            ));
        }
        if self.fanout.workers == 0 || self.fanout.workers > 256 {
            return Err(Error::Config(
                "fanout.workers must be between 1 and 256".to_string(),
            ));
        }
        if self.fanout.slice_hours == 0 || self.fanout.slice_hours > MAX_SLICE_HOURS {
            return Err(Error::Config(format!(
                "fanout.slice_hours must be between 1 and {}",
                MAX_SLICE_HOURS
            )));
        }
        if self.cache.enabled && self.cache.ttl_hours == 0 {
            return Err(Error::Config(
                "cache.ttl_hours must be at least 1 when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the history walker
    pub fn walk_settings(&self) -> WalkSettings {
        WalkSettings {
            window_start: self.analytics.window_start().timestamp(),
            page_size: self.analytics.page_size,
            retry: self.fetch.retry_policy(),
            workers: self.fanout.workers,
            slice: Duration::from_secs(self.fanout.slice_hours.saturating_mul(3600)),
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/unwrapped/config.toml` (~/.config/unwrapped/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("unwrapped").join("config.toml")
    }

    /// Returns the data directory path (report cache, profile images)
    ///
    /// `$XDG_DATA_HOME/unwrapped/` (~/.local/share/unwrapped/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("unwrapped")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/unwrapped/` (~/.local/state/unwrapped/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("unwrapped")
    }
}

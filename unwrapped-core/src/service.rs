//! Cache-aside front for the analytics engine
//!
//! Both the CLI and the HTTP server go through [`AnalyticsService`]: it
//! normalizes the requested username, serves an unexpired cached report
//! when one exists, and otherwise runs the engine and stores the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::analytics::Report;
use crate::cache::{ReportCache, SqliteReportCache};
use crate::config::Config;
use crate::engine::AnalyticsEngine;
use crate::error::{Error, Result};

/// Longest public username the platform allows
const MAX_USERNAME_LEN: usize = 32;

pub struct AnalyticsService {
    engine: AnalyticsEngine,
    cache: Option<Arc<dyn ReportCache>>,
    ttl: Duration,
}

impl AnalyticsService {
    pub fn new(engine: AnalyticsEngine, cache: Option<Arc<dyn ReportCache>>, ttl: Duration) -> Self {
        Self { engine, cache, ttl }
    }

    /// Build the engine and (if enabled) open the report cache
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = AnalyticsEngine::from_config(config)?;
        let cache: Option<Arc<dyn ReportCache>> = if config.cache.enabled {
            let path = config.cache.path();
            tracing::info!(path = %path.display(), "Opening report cache");
            Some(Arc::new(SqliteReportCache::open(&path)?))
        } else {
            None
        };
        Ok(Self::new(engine, cache, config.cache.ttl()))
    }

    /// Report for `raw_username`, from cache unless `refresh` is set.
    ///
    /// A cached report covering a different window than this engine's is
    /// treated as a miss and overwritten.
    pub async fn report(&self, raw_username: &str, refresh: bool) -> Result<Report> {
        let username = normalize_username(raw_username)?;
        let now = Utc::now();
        let window_start = self.engine.window_start();

        if let Some(cache) = self.cache.as_ref().filter(|_| !refresh) {
            match cached_report(cache, &username, now).await {
                Ok(Some(report)) if report.window_start == window_start => {
                    tracing::info!(channel = %username, "Serving cached report");
                    return Ok(report);
                }
                Ok(Some(report)) => {
                    tracing::info!(
                        channel = %username,
                        cached = %report.window_start,
                        wanted = %window_start,
                        "Cached report covers another window, recomputing"
                    );
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(channel = %username, "Report cache read failed: {}", e),
            }
        }

        let report = self.engine.process_analytics_at(&username, now).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = store_report(cache, &username, &report, self.ttl, now).await {
                tracing::warn!(channel = %username, "Report cache write failed: {}", e);
            }
        }

        Ok(report)
    }
}

// SQLite calls block, so they run on the blocking pool instead of the
// request's worker thread.

async fn cached_report(
    cache: &Arc<dyn ReportCache>,
    username: &str,
    now: DateTime<Utc>,
) -> Result<Option<Report>> {
    let cache = Arc::clone(cache);
    let username = username.to_string();
    tokio::task::spawn_blocking(move || cache.get(&username, now))
        .await
        .map_err(|e| Error::Internal(format!("cache read task failed: {}", e)))?
}

async fn store_report(
    cache: &Arc<dyn ReportCache>,
    username: &str,
    report: &Report,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let cache = Arc::clone(cache);
    let username = username.to_string();
    let report = report.clone();
    tokio::task::spawn_blocking(move || cache.put(&username, &report, ttl, now))
        .await
        .map_err(|e| Error::Internal(format!("cache write task failed: {}", e)))?
}

/// Canonical cache key and lookup name for a user-supplied channel username.
///
/// Trims whitespace, drops a leading `@` or `t.me/` link prefix and
/// lowercases. The result must be 1-32 characters of `[A-Za-z0-9_]`.
pub fn normalize_username(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let trimmed = ["https://t.me/", "http://t.me/", "t.me/"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

    let valid = !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidUsername(raw.to_string()));
    }

    Ok(name.to_ascii_lowercase())
}

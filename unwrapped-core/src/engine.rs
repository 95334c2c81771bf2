//! Analytics engine facade
//!
//! One call produces one complete report:
//!
//! ```text
//! process_analytics(username)
//!   ├─ authenticate (once per engine)
//!   ├─ resolve channel
//!   ├─ publish profile photo (best effort)
//!   ├─ walk history ──► Aggregator
//!   ├─ longest streak
//!   └─ assemble Report
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use crate::analytics::{Aggregator, Report, StreakPolicy};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{HistoryWalker, WalkMode, WalkSettings};
use crate::profile::{object_name, sniff_content_type, FsProfileStore, ProfileStore};
use crate::source::{Authenticator, ChannelDirectory, GatewayClient, MessageSource};
use crate::types::Channel;

/// Per-engine choices that are not walker tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub mode: WalkMode,
    pub streak: StreakPolicy,
    /// Validity requested for profile image URLs
    pub profile_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mode: WalkMode::Sequential,
            streak: StreakPolicy::Chronological,
            profile_ttl: Duration::from_secs(48 * 3600),
        }
    }
}

/// Orchestrates one analytics run per call.
///
/// The engine keeps no state between runs apart from the authentication gate.
pub struct AnalyticsEngine {
    auth: Arc<dyn Authenticator>,
    directory: Arc<dyn ChannelDirectory>,
    walker: HistoryWalker,
    profiles: Option<Arc<dyn ProfileStore>>,
    settings: EngineSettings,
    authenticated: OnceCell<()>,
}

impl AnalyticsEngine {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        directory: Arc<dyn ChannelDirectory>,
        source: Arc<dyn MessageSource>,
        profiles: Option<Arc<dyn ProfileStore>>,
        walk: WalkSettings,
        settings: EngineSettings,
    ) -> Self {
        Self {
            auth,
            directory,
            walker: HistoryWalker::new(source, walk),
            profiles,
            settings,
            authenticated: OnceCell::new(),
        }
    }

    /// Wire the gateway client and filesystem profile store from config
    pub fn from_config(config: &Config) -> Result<Self> {
        let gateway = Arc::new(GatewayClient::new(&config.gateway)?);
        let profiles: Option<Arc<dyn ProfileStore>> = if config.profiles.enabled {
            Some(Arc::new(FsProfileStore::from_config(&config.profiles)))
        } else {
            None
        };

        Ok(Self::new(
            gateway.clone(),
            gateway.clone(),
            gateway,
            profiles,
            config.walk_settings(),
            EngineSettings {
                mode: config.analytics.mode,
                streak: config.analytics.streak,
                profile_ttl: config.profiles.url_ttl(),
            },
        ))
    }

    /// First instant covered by every report this engine produces.
    pub fn window_start(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.walker.settings().window_start, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Produce a complete report for `username`, covering up to now.
    pub async fn process_analytics(&self, username: &str) -> Result<Report> {
        self.process_analytics_at(username, Utc::now()).await
    }

    /// Produce a complete report for `username`, covering up to `now`.
    pub async fn process_analytics_at(&self, username: &str, now: DateTime<Utc>) -> Result<Report> {
        tracing::info!(channel = username, mode = %self.settings.mode, "Starting analytics run");

        self.authenticated
            .get_or_try_init(|| self.auth.ensure_authenticated())
            .await
            .map_err(|e| Error::operation("authenticate", username, e))?;

        let channel = self
            .directory
            .resolve_channel(username)
            .await
            .map_err(|e| Error::operation("resolve channel", username, e))?;

        let channel_profile = self.publish_profile(&channel).await;

        let (aggregator, stats) = self
            .walker
            .walk(self.settings.mode, channel.peer(), Aggregator::new(), now.timestamp())
            .await
            .map_err(|e| Error::operation("walk history", username, e))?;

        let aggregate = aggregator.finish(self.settings.streak);
        let window_start = self.window_start();

        tracing::info!(
            channel = username,
            posts = aggregate.totals.total_posts,
            pages = stats.pages,
            streak = aggregate.trends.longest_posting_streak,
            "Analytics run complete"
        );

        Ok(Report::assemble(
            &channel,
            channel_profile,
            aggregate,
            window_start,
            now,
        ))
    }

    /// Download, store and link the channel photo. Failures are logged only.
    async fn publish_profile(&self, channel: &Channel) -> Option<String> {
        let store = self.profiles.as_ref()?;

        match self.try_publish_profile(store.as_ref(), channel).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(channel = %channel.username, "Profile image unavailable: {}", e);
                None
            }
        }
    }

    async fn try_publish_profile(
        &self,
        store: &dyn ProfileStore,
        channel: &Channel,
    ) -> Result<Option<String>> {
        let Some(bytes) = self.directory.download_profile_photo(channel).await? else {
            return Ok(None);
        };

        let content_type = sniff_content_type(&bytes);
        let name = object_name(channel.id, content_type);
        store.upload(&name, &bytes, content_type).await?;
        let url = store.access_url(&name, self.settings.profile_ttl).await?;
        Ok(Some(url))
    }
}

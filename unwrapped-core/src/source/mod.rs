//! Collaborators the engine consumes
//!
//! The messaging platform is reached through three narrow traits so the
//! walker and engine can run against anything that yields pages:
//!
//! - [`Authenticator`]: one-time session gate before any fetch
//! - [`ChannelDirectory`]: username resolution and profile photo download
//! - [`MessageSource`]: one page of history per cursor
//!
//! [`GatewayClient`] implements all three against an HTTP history gateway.

mod gateway;

pub use gateway::GatewayClient;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::types::{Channel, ChannelPeer, Message};

/// Parameters for one history page.
///
/// Asks for up to `limit` messages strictly older than
/// `(offset_date, offset_id)`, newest first. `offset_id == 0` means the
/// date alone bounds the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRequest {
    pub peer: ChannelPeer,
    pub offset_date: i64,
    pub offset_id: i64,
    pub limit: usize,
}

/// Yields pages of channel history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_history(&self, request: &HistoryRequest) -> std::result::Result<Vec<Message>, FetchError>;
}

/// Establishes the platform session.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Fails with [`Error::AuthFailed`](crate::Error::AuthFailed) when the session is unusable.
    async fn ensure_authenticated(&self) -> Result<()>;
}

/// Looks up channels and their profile photos.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Fails with `ChannelNotFound` or `NotAChannel`.
    async fn resolve_channel(&self, username: &str) -> Result<Channel>;

    /// Raw image bytes, `Ok(None)` when the channel has no photo.
    async fn download_profile_photo(&self, channel: &Channel) -> Result<Option<Vec<u8>>>;
}

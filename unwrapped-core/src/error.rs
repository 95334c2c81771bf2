//! Error types for unwrapped-core

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a [`MessageSource`](crate::source::MessageSource) for one request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The platform asked us to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Network hiccup or server-side failure, worth retrying
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The request can never succeed as issued
    #[error("fatal fetch failure: {0}")]
    Fatal(String),
}

impl FetchError {
    /// Whether the walker should retry the same request.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Fatal(_))
    }
}

/// Main error type for the unwrapped-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid required setting
    #[error("configuration error: {0}")]
    Config(String),

    /// The platform session could not be authorized
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Username does not resolve to anything
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// Username resolves to a user or group instead of a broadcast channel
    #[error("chat is not a channel: {0}")]
    NotAChannel(String),

    /// Username is empty or contains characters the platform never allows
    #[error("invalid channel username: {0:?}")]
    InvalidUsername(String),

    /// History fetch failed without retry
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Transient failures persisted past the retry budget
    #[error("fetch failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: FetchError },

    /// Profile image could not be downloaded
    #[error("download failed: {0}")]
    DownloadFailed(String),

    /// Profile image could not be stored
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A fatal failure inside one analytics run
    #[error("{op} [channel={channel}]: {source}")]
    Operation {
        op: &'static str,
        channel: String,
        #[source]
        source: Box<Error>,
    },

    /// Report cache error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Task or lock failure inside the crate
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an error with the failing operation and channel.
    pub fn operation(op: &'static str, channel: impl Into<String>, source: Error) -> Self {
        Error::Operation {
            op,
            channel: channel.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping `Operation` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the failure came from fetching history (as opposed to the caller's input).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self.root(),
            Error::Fetch(_) | Error::RetriesExhausted { .. }
        )
    }
}

/// Result type alias for unwrapped-core
pub type Result<T> = std::result::Result<T, Error>;

//! HTTP client for the channel history gateway
//!
//! The gateway fronts a logged-in platform session and exposes channel
//! lookup, profile photos and paged history as plain JSON:
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `GET /v1/session` | Session check |
//! | `GET /v1/channels/{username}` | Resolve a public username |
//! | `GET /v1/channels/{id}/photo` | Raw profile photo bytes |
//! | `GET /v1/channels/{id}/history` | One page of history, newest first |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{Authenticator, ChannelDirectory, HistoryRequest, MessageSource};
use crate::config::GatewayConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{Channel, Message};

/// Response from GET /v1/channels/{username}
#[derive(Debug, Deserialize)]
struct ResolvedChat {
    id: i64,
    #[serde(default)]
    access_hash: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    username: Option<String>,
    /// `channel`, `group` or `user`
    kind: String,
    #[serde(default)]
    has_photo: bool,
}

/// Response from GET /v1/channels/{id}/history
#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<Message>,
}

/// HTTP client for the history gateway
pub struct GatewayClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a gateway client from configuration
    ///
    /// Returns an error if `base_url` is missing or the token is not a valid header value.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("gateway.base_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_token: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Authenticator for GatewayClient {
    async fn ensure_authenticated(&self) -> Result<()> {
        let url = format!("{}/v1/session", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::AuthFailed(format!("gateway unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Gateway session is authorized");
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::AuthFailed(format!("session check ({}): {}", status, error_text)))
    }
}

#[async_trait]
impl ChannelDirectory for GatewayClient {
    async fn resolve_channel(&self, username: &str) -> Result<Channel> {
        let url = format!(
            "{}/v1/channels/{}",
            self.base_url,
            urlencoding::encode(username)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(classify_transport(&e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ChannelNotFound(username.to_string()));
        }
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Fetch(classify_status(status, retry_after, &error_text)));
        }

        let chat: ResolvedChat = response
            .json()
            .await
            .map_err(|e| Error::Fetch(FetchError::Fatal(format!("failed to parse channel: {}", e))))?;

        if chat.kind != "channel" {
            return Err(Error::NotAChannel(format!("{} is a {}", username, chat.kind)));
        }

        Ok(Channel {
            id: chat.id,
            access_hash: chat.access_hash,
            title: chat.title,
            username: chat.username.unwrap_or_else(|| username.to_string()),
            has_photo: chat.has_photo,
        })
    }

    async fn download_profile_photo(&self, channel: &Channel) -> Result<Option<Vec<u8>>> {
        if !channel.has_photo {
            return Ok(None);
        }

        let url = format!(
            "{}/v1/channels/{}/photo?access_hash={}",
            self.base_url, channel.id, channel.access_hash
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::DownloadFailed(format!("API error ({})", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::DownloadFailed(format!("failed to read photo: {}", e)))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }
}

#[async_trait]
impl MessageSource for GatewayClient {
    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> std::result::Result<Vec<Message>, FetchError> {
        let url = format!(
            "{}/v1/channels/{}/history?access_hash={}&offset_date={}&offset_id={}&limit={}",
            self.base_url,
            request.peer.id,
            request.peer.access_hash,
            request.offset_date,
            request.offset_id,
            request.limit
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(classify_status(status, retry_after, &error_text));
        }

        let page: HistoryPage = response
            .json()
            .await
            .map_err(|e| FetchError::Fatal(format!("failed to parse history page: {}", e)))?;
        Ok(page.messages)
    }
}

/// Map a non-success status to a fetch failure
fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FetchError::RateLimited { retry_after }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        FetchError::Transient(format!("API error ({}): {}", status, body))
    } else {
        FetchError::Fatal(format!("API error ({}): {}", status, body))
    }
}

/// Map a transport failure to a fetch failure
fn classify_transport(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        FetchError::Transient(format!("HTTP request failed: {}", error))
    } else {
        FetchError::Fatal(format!("HTTP request failed: {}", error))
    }
}

/// `Retry-After` in delta-seconds form
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

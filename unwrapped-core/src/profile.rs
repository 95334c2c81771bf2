//! Channel profile image storage
//!
//! Reports reference the channel photo by URL rather than embedding it.
//! The engine downloads the photo once per run and hands it to a
//! [`ProfileStore`]; failures on this path never fail the report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProfileConfig;
use crate::error::{Error, Result};

/// Destination for profile images.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// A URL a client can fetch the image from for at least `ttl`.
    async fn access_url(&self, name: &str, ttl: Duration) -> Result<String>;
}

/// Stores images in a local directory served by the HTTP front end.
#[derive(Debug, Clone)]
pub struct FsProfileStore {
    dir: PathBuf,
    url_prefix: String,
}

impl FsProfileStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ProfileConfig) -> Self {
        Self::new(config.dir(), config.url_prefix.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a stored image back, with its content type.
    ///
    /// Returns `Ok(None)` for unknown or unsafe names.
    pub async fn load(&self, name: &str) -> Result<Option<(Vec<u8>, &'static str)>> {
        if !is_safe_name(name) {
            return Ok(None);
        }
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => {
                let content_type = sniff_content_type(&bytes);
                Ok(Some((bytes, content_type)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[async_trait]
impl ProfileStore for FsProfileStore {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        if !is_safe_name(name) {
            return Err(Error::UploadFailed(format!("refusing object name {:?}", name)));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::UploadFailed(format!("create {:?}: {}", self.dir, e)))?;

        // Write then rename so readers never see a partial image
        let target = self.dir.join(name);
        let staging = self.dir.join(format!(".{}.tmp", name));
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| Error::UploadFailed(format!("write {:?}: {}", staging, e)))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| Error::UploadFailed(format!("rename {:?}: {}", target, e)))?;

        tracing::debug!(name, content_type, size = bytes.len(), "Stored profile image");
        Ok(())
    }

    async fn access_url(&self, name: &str, _ttl: Duration) -> Result<String> {
        // Local files do not expire; the ttl only matters for remote stores
        Ok(format!("{}/{}", self.url_prefix, urlencoding::encode(name)))
    }
}

/// Object name for a channel's photo: `<channel_id>.<ext>`.
pub fn object_name(channel_id: i64, content_type: &str) -> String {
    format!("{}.{}", channel_id, extension_for(content_type))
}

/// Content type from the leading magic bytes, JPEG when unknown.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Plain file names only: no separators, no leading dot.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

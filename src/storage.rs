//! Blob storage for downloaded tender files.
//!
//! Keys look like `tenders/{tender}/{category}/{millis}-{rand}-{name}{ext}`.
//! The pipeline only needs [`BlobStore`]; [`LocalBlobStore`] keeps blobs on
//! disk under the configured storage directory.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::{make_url_safe, sanitize_file_name};

/// Error reported by a storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("storage error: {message} (code: {code})")]
pub struct StorageError {
    pub code: String,
    pub message: String,
}

impl StorageError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::new(format!("io:{:?}", e.kind()).to_lowercase(), e.to_string())
    }
}

/// Location of an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub public_url: String,
}

/// Object storage used for document files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path`. Existing keys are never overwritten.
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, StorageError>;

    fn public_url(&self, path: &str) -> String;

    /// Time-limited URL for a stored blob.
    fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError>;
}

/// Storage key for a downloaded file.
pub fn storage_key(tender_id: i64, doc_type: &str, display_name: &str, extension: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    let stem = display_name
        .strip_suffix(extension)
        .filter(|s| !extension.is_empty() && !s.is_empty())
        .unwrap_or(display_name);
    format!(
        "tenders/{}/{}/{}-{}-{}{}",
        tender_id,
        make_url_safe(doc_type),
        Utc::now().timestamp_millis(),
        &random[..8],
        make_url_safe(&sanitize_file_name(stem)),
        extension
    )
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: Option<String>,
    signing_secret: Option<String>,
}

impl LocalBlobStore {
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: Option<String>,
        signing_secret: Option<String>,
    ) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
            signing_secret,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a key, rejecting keys that escape the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(StorageError::new("invalid_key", format!("invalid key: {}", path)));
        }
        Ok(self.root.join(relative))
    }

    fn signature(secret: &str, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(b"|");
        hasher.update(path.as_bytes());
        hasher.update(b"|");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a signature produced by [`BlobStore::signed_url`].
    pub fn verify_signature(&self, path: &str, expires: i64, signature: &str) -> bool {
        let Some(secret) = self.signing_secret.as_deref() else {
            return false;
        };
        expires >= Utc::now().timestamp() && Self::signature(secret, path, expires) == signature
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, StorageError> {
        let target = self.resolve(path)?;
        if tokio::fs::try_exists(&target).await? {
            return Err(StorageError::new(
                "already_exists",
                format!("object already exists: {}", path),
            ));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        info!(
            "Stored {} ({} bytes, {})",
            path,
            bytes.len(),
            content_type
        );

        Ok(StoredBlob {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, path),
            None => {
                let absolute = std::path::absolute(self.root.join(path))
                    .unwrap_or_else(|_| self.root.join(path));
                url::Url::from_file_path(&absolute)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| format!("file://{}", absolute.display()))
            }
        }
    }

    fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, StorageError> {
        let secret = self.signing_secret.as_deref().ok_or_else(|| {
            StorageError::new("signing_disabled", "no signing secret configured")
        })?;
        self.resolve(path)?;
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = Self::signature(secret, path, expires);
        debug!("Signed {} until {}", path, expires);
        Ok(format!(
            "{}?expires={}&signature={}",
            self.public_url(path),
            expires,
            signature
        ))
    }
}

//! HTTP client carrying the portal session cookies.

mod response;

pub use response::{parse_content_disposition_filename, FetchedFile};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::cookies::SessionCookie;

/// Browser-like user agent; the portal rejects obvious bots.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Errors from the network collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("{0}")]
    Other(String),
}

/// Retrieves raw bytes for a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher with a cookie jar seeded from the session file.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client without session cookies.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_cookies(timeout, &[])
    }

    /// Create a client whose cookie jar starts with `cookies`.
    pub fn with_cookies(timeout: Duration, cookies: &[SessionCookie]) -> Result<Self, FetchError> {
        let jar = Jar::default();
        for cookie in cookies {
            if let Some(origin) = cookie.origin_url() {
                jar.add_cookie_str(&cookie.to_set_cookie(), &origin);
            }
        }
        debug!("HTTP client seeded with {} cookies", cookies.len());

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(Self { client })
    }

    /// GET a URL, returning the body with its filename and content type.
    pub async fn fetch_with_meta(&self, url: &str) -> Result<FetchedFile, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(reqwest::header::CONTENT_TYPE);
        let filename = header(reqwest::header::CONTENT_DISPOSITION)
            .as_deref()
            .and_then(parse_content_disposition_filename);

        let bytes = response.bytes().await?.to_vec();
        debug!("Fetched {} bytes from {}", bytes.len(), final_url);

        Ok(FetchedFile {
            url: url.to_string(),
            final_url,
            content_type,
            filename,
            bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.fetch_with_meta(url).await?.bytes)
    }
}

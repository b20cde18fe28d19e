//! HTML page retrieval through the network collaborator.

use std::sync::Arc;

use tracing::{debug, warn};

use super::http_client::Fetcher;
use crate::utils::{with_retry, RetryPolicy};

/// Whether a decoded payload is an HTML document.
pub fn looks_like_html(text: &str) -> bool {
    text.contains("<html") || text.contains("<!DOCTYPE") || text.contains("<!doctype")
        || text.contains("<body")
}

/// Fetches pages and hands back their HTML, or nothing.
#[derive(Clone)]
pub struct PageFetcher {
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
}

impl PageFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self { fetcher, retry }
    }

    /// Fetch `url` and return its HTML.
    ///
    /// Network failures are retried; once exhausted they are logged and
    /// yield `None`, as does a payload that is not HTML.
    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        let bytes = match with_retry(self.retry, || self.fetcher.fetch(url)).await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to fetch page {}: {}", url, e);
                return None;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        if looks_like_html(&text) {
            Some(text.into_owned())
        } else {
            debug!("Response from {} is not HTML ({} bytes)", url, bytes.len());
            None
        }
    }
}

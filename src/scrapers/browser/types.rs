//! Headless browser collaborator interfaces.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::scrapers::cookies::SessionCookie;

/// Errors from the headless browser.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {}s waiting for {what}", .timeout.as_secs())]
    Timeout { what: String, timeout: Duration },

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// A browser tab. Callers must `close` it on every exit path.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<(), BrowserError>;

    /// Navigate, failing with [`BrowserError::Timeout`] after `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until `selector` matches something, up to `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// Source of browser pages sharing one authenticated session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn acquire_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// Cookies applied to each page before navigation.
    fn session_cookies(&self) -> Vec<SessionCookie>;
}

//! Chrome DevTools implementation of the browser collaborator.

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
#[cfg(feature = "browser")]
use chromiumoxide::handler::{Handler, HandlerConfig};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

use super::types::{BrowserError, BrowserPage, BrowserSession};
use crate::config::BrowserSettings;
use crate::scrapers::cookies::SessionCookie;

/// Poll interval while waiting for a selector.
#[cfg(feature = "browser")]
const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Browser session backed by a launched or remote Chrome.
#[cfg(feature = "browser")]
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    cookies: Vec<SessionCookie>,
}

#[cfg(feature = "browser")]
impl ChromiumSession {
    /// Executables tried, in order, when launching a local browser.
    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    /// Launch a local browser, or connect to `settings.remote_url` if set.
    pub async fn start(
        settings: &BrowserSettings,
        cookies: Vec<SessionCookie>,
    ) -> Result<Self, BrowserError> {
        let (browser, mut handler) = match settings.remote_url.as_deref() {
            Some(remote) => Self::connect_remote(remote, settings).await?,
            None => Self::launch_local(settings).await?,
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            cookies,
        })
    }

    fn find_chrome() -> Result<PathBuf, BrowserError> {
        for cmd in Self::CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome at: {}", path.display());
                return Ok(path);
            }
        }
        Err(BrowserError::Unavailable(
            "Chrome/Chromium not found in PATH; install it or set BROWSER_URL".to_string(),
        ))
    }

    async fn launch_local(
        settings: &BrowserSettings,
    ) -> Result<(Browser, Handler), BrowserError> {
        info!("Launching browser (headless={})", settings.headless);
        let mut builder = BrowserConfig::builder().chrome_executable(Self::find_chrome()?);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(BrowserError::Launch)?;

        Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))
    }

    async fn connect_remote(
        url: &str,
        settings: &BrowserSettings,
    ) -> Result<(Browser, Handler), BrowserError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
        let version: serde_json::Value = reqwest::get(&version_url)
            .await
            .map_err(|e| BrowserError::Launch(format!("{}: {}", version_url, e)))?
            .json()
            .await
            .map_err(|e| BrowserError::Launch(format!("bad version info: {}", e)))?;
        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::Launch("no webSocketDebuggerUrl".to_string()))?;

        let handler_config = HandlerConfig {
            request_timeout: settings.navigation_timeout(),
            ..Default::default()
        };
        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))
    }
}

#[cfg(feature = "browser")]
impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn acquire_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    fn session_cookies(&self) -> Vec<SessionCookie> {
        self.cookies.clone()
    }
}

#[cfg(feature = "browser")]
struct ChromiumPage {
    page: Page,
}

#[cfg(feature = "browser")]
#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<(), BrowserError> {
        for cookie in cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.as_str())
                .value(cookie.value.as_str())
                .domain(cookie.domain.as_str());
            if let Some(path) = cookie.path.as_deref() {
                builder = builder.path(path);
            }
            match builder.build() {
                Ok(param) => {
                    if let Err(e) = self.page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }
        Ok(())
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        debug!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e,
            })?;

        let navigation = async {
            self.page.execute(params).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout {
                what: format!("navigation to {}", url),
                timeout,
            })?
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(BrowserError::Evaluation)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromiumSession;

#[cfg(not(feature = "browser"))]
impl ChromiumSession {
    pub async fn start(
        _settings: &BrowserSettings,
        _cookies: Vec<SessionCookie>,
    ) -> Result<Self, BrowserError> {
        Err(BrowserError::Unavailable(
            "browser support not compiled; rebuild with --features browser".to_string(),
        ))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn acquire_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Err(BrowserError::Unavailable(
            "browser support not compiled".to_string(),
        ))
    }

    fn session_cookies(&self) -> Vec<SessionCookie> {
        Vec::new()
    }
}

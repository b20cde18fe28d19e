//! Configuration for tenderacquire.
//!
//! Settings come from an optional TOML file (`tenderacquire.toml` in the
//! working directory, or an explicit `--config` path); environment variables
//! override file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::RetryPolicy;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tenderacquire.toml";

/// Origin of the tender portal; root-relative links are joined onto it.
pub const DEFAULT_SITE_ORIGIN: &str = "https://www.ihalebul.com";

fn default_database_path() -> PathBuf {
    PathBuf::from("tenderacquire.db")
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_site_origin() -> String {
    DEFAULT_SITE_ORIGIN.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_category_delay() -> u64 {
    2000
}

fn default_unpack_tool() -> String {
    "unrar".to_string()
}

fn default_true() -> bool {
    true
}

/// Retry budget for network-touching operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay() -> u64 {
    2000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms))
    }
}

/// Headless browser used for AJAX-rendered tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Wait for the first data row; failure here is not fatal.
    #[serde(default = "default_selector_timeout")]
    pub selector_timeout_secs: u64,

    /// Pause after forcing the grid to show every row.
    #[serde(default = "default_render_pause")]
    pub render_pause_ms: u64,

    #[serde(default = "default_browser_retry_delay")]
    pub retry_base_delay_ms: u64,
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_selector_timeout() -> u64 {
    10
}

fn default_render_pause() -> u64 {
    2000
}

fn default_browser_retry_delay() -> u64 {
    3000
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            remote_url: None,
            headless: true,
            navigation_timeout_secs: default_navigation_timeout(),
            selector_timeout_secs: default_selector_timeout(),
            render_pause_ms: default_render_pause(),
            retry_base_delay_ms: default_browser_retry_delay(),
        }
    }
}

impl BrowserSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    pub fn render_pause(&self) -> Duration {
        Duration::from_millis(self.render_pause_ms)
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Root directory for stored blobs.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Prefix for public blob URLs; falls back to `file://` URLs when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Secret for signed blob URLs.
    #[serde(default)]
    pub signing_secret: Option<String>,

    #[serde(default = "default_site_origin")]
    pub site_origin: String,

    /// Session cookies exported from a logged-in browser (JSON array).
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Politeness delay between tender categories.
    #[serde(default = "default_category_delay")]
    pub category_delay_ms: u64,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub browser: BrowserSettings,

    /// External rar unpacker.
    #[serde(default = "default_unpack_tool")]
    pub unpack_tool: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            storage_dir: default_storage_dir(),
            public_base_url: None,
            signing_secret: None,
            site_origin: default_site_origin(),
            cookies_file: None,
            request_timeout_secs: default_request_timeout(),
            category_delay_ms: default_category_delay(),
            retry: RetrySettings::default(),
            browser: BrowserSettings::default(),
            unpack_tool: default_unpack_tool(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `tenderacquire.toml` if present,
    /// then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self, String> {
        let settings = match path {
            Some(p) => Self::load_from_path(p).await?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if tokio::fs::try_exists(default_path).await.unwrap_or(false) {
                    Self::load_from_path(default_path).await?
                } else {
                    Self::default()
                }
            }
        };
        Ok(settings.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Parse a TOML settings file.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
    }

    /// Apply `TENDER_*` / `BROWSER_URL` overrides from `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TENDER_DATABASE") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("TENDER_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(v);
        }
        if let Some(v) = get("TENDER_PUBLIC_URL") {
            self.public_base_url = Some(v);
        }
        if let Some(v) = get("TENDER_SIGNING_SECRET") {
            self.signing_secret = Some(v);
        }
        if let Some(v) = get("TENDER_SITE_ORIGIN") {
            self.site_origin = v;
        }
        if let Some(v) = get("TENDER_COOKIES_FILE") {
            self.cookies_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("BROWSER_URL") {
            self.browser.remote_url = Some(v);
        }
        if let Some(v) = get("TENDER_UNRAR") {
            self.unpack_tool = v;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn category_delay(&self) -> Duration {
        Duration::from_millis(self.category_delay_ms)
    }

    /// Retry policy for the dynamic table scraper.
    pub fn browser_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.browser.retry_base_delay_ms),
        )
    }

    /// Create the storage directory and the database's parent directory.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.storage_dir)?;
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

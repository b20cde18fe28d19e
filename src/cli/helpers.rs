//! Shared helpers for CLI commands.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::config::Settings;
use crate::repository::SqliteRepository;
use crate::scrapers::browser::{ChromiumSession, DynamicTableScraper};
use crate::scrapers::{load_cookies, HttpClient, SessionCookie};
use crate::services::{AnalysisQueue, PipelineOptions, TenderProcessor};
use crate::storage::LocalBlobStore;

/// Truncate a string to at most `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Spinner on stderr for long-running commands.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Opened stores and collaborators shared by commands.
pub struct AppContext {
    pub settings: Settings,
    pub repo: Arc<SqliteRepository>,
    pub blobs: Arc<LocalBlobStore>,
    cookies: Vec<SessionCookie>,
}

impl AppContext {
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        settings.ensure_directories()?;
        let repo = Arc::new(SqliteRepository::new(&settings.database_path)?);
        let blobs = Arc::new(LocalBlobStore::new(
            &settings.storage_dir,
            settings.public_base_url.clone(),
            settings.signing_secret.clone(),
        ));
        let cookies = settings
            .cookies_file
            .as_deref()
            .map(load_cookies)
            .unwrap_or_default();
        Ok(Self {
            settings,
            repo,
            blobs,
            cookies,
        })
    }

    pub fn queue(&self) -> AnalysisQueue {
        AnalysisQueue::new(self.repo.clone())
    }

    /// Build the orchestrator, with a browser for goods lists when one starts.
    pub async fn processor(&self, use_browser: bool) -> anyhow::Result<TenderProcessor> {
        let client = Arc::new(HttpClient::with_cookies(
            self.settings.request_timeout(),
            &self.cookies,
        )?);
        let processor = TenderProcessor::new(
            self.repo.clone(),
            self.repo.clone(),
            self.blobs.clone(),
            client,
            PipelineOptions::from_settings(&self.settings),
        );
        if !use_browser {
            return Ok(processor);
        }

        match ChromiumSession::start(&self.settings.browser, self.cookies.clone()).await {
            Ok(session) => Ok(processor.with_table_scraper(DynamicTableScraper::new(
                Arc::new(session),
                self.settings.browser.clone(),
            ))),
            Err(e) => {
                eprintln!(
                    "{} Browser unavailable, goods lists use static HTML: {}",
                    style("!").yellow(),
                    e
                );
                Ok(processor)
            }
        }
    }
}

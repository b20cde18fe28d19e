//! Goods/services grid scraping through a headless browser.
//!
//! The grid on goods-list pages is filled in by AJAX, so the static HTML
//! usually holds an empty table. Rendering the page lets the grid load and
//! allows forcing it to show every row before scraping.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::script::{SHOW_ALL_ROWS_SCRIPT, TABLE_SCRAPE_SCRIPT};
use super::types::{BrowserError, BrowserPage, BrowserSession};
use crate::config::BrowserSettings;
use crate::scrapers::extract::{is_valid_row, TableRow};

/// Selector for the first rendered data row.
pub const DATA_ROW_SELECTOR: &str = "table tbody tr";

/// Renders AJAX grids and hands their rows to the table-scrape script.
#[derive(Clone)]
pub struct DynamicTableScraper {
    session: Arc<dyn BrowserSession>,
    settings: BrowserSettings,
}

impl DynamicTableScraper {
    pub fn new(session: Arc<dyn BrowserSession>, settings: BrowserSettings) -> Self {
        Self { session, settings }
    }

    /// Scrape the grid on `url`.
    ///
    /// Returns `Ok(None)` when the page does not load in time or holds no
    /// rows. Errors acquiring the page, navigating or running the scrape
    /// script are returned so callers can retry.
    pub async fn scrape(&self, url: &str) -> Result<Option<Vec<TableRow>>, BrowserError> {
        info!("Rendering goods list {}", url);
        let page = self.session.acquire_page().await?;

        // Inner function keeps the page close on every exit path.
        let result = self.scrape_inner(page.as_ref(), url).await;
        if let Err(e) = page.close().await {
            debug!("Failed to close browser page: {}", e);
        }
        result
    }

    async fn scrape_inner(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<Option<Vec<TableRow>>, BrowserError> {
        let cookies = self.session.session_cookies();
        if !cookies.is_empty() {
            page.set_cookies(&cookies).await?;
            debug!("Applied {} session cookies", cookies.len());
        }

        match page.navigate(url, self.settings.navigation_timeout()).await {
            Ok(()) => {}
            Err(BrowserError::Timeout { .. }) => {
                warn!(
                    "Navigation to {} timed out after {}s",
                    url, self.settings.navigation_timeout_secs
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = page
            .wait_for_selector(DATA_ROW_SELECTOR, self.settings.selector_timeout())
            .await
        {
            warn!("No data rows rendered on {} ({}), table may be absent", url, e);
        }

        match page.evaluate(SHOW_ALL_ROWS_SCRIPT).await {
            Ok(changed) => {
                debug!("Show-all-rows applied: {}", changed);
                tokio::time::sleep(self.settings.render_pause()).await;
            }
            Err(e) => debug!("Could not change grid page size: {}", e),
        }

        let value = page.evaluate(TABLE_SCRAPE_SCRIPT).await?;
        let rows = rows_from_json(&value);
        if rows.is_empty() {
            warn!("Goods list on {} is empty", url);
            Ok(None)
        } else {
            info!("Scraped {} goods list rows from {}", rows.len(), url);
            Ok(Some(rows))
        }
    }
}

/// Convert the script's JSON array into rows, keeping only valid ones.
pub fn rows_from_json(value: &serde_json::Value) -> Vec<TableRow> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| item.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(key, v)| {
                    let text = match v {
                        serde_json::Value::String(s) => s.trim().to_string(),
                        serde_json::Value::Null => return None,
                        other => other.to_string(),
                    };
                    (!text.is_empty()).then(|| (key.clone(), text))
                })
                .collect::<TableRow>()
        })
        .filter(is_valid_row)
        .collect()
}

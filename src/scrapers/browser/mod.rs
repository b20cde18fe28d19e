//! Headless-browser scraping for AJAX-rendered tender grids.
//!
//! Uses chromiumoxide (CDP) when the `browser` feature is enabled. The
//! scraper only depends on the [`BrowserSession`] / [`BrowserPage`] traits,
//! so sessions are injected rather than held globally.

mod chromium;
mod script;
mod table;
mod types;

pub use chromium::ChromiumSession;
pub use script::{SHOW_ALL_ROWS_SCRIPT, TABLE_SCRAPE_SCRIPT};
pub use table::{rows_from_json, DynamicTableScraper, DATA_ROW_SELECTOR};
pub use types::{BrowserError, BrowserPage, BrowserSession};

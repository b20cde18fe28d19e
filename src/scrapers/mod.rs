//! Page retrieval and extraction for tender portals.
//!
//! - `http_client`: network collaborator with session cookies
//! - `page`: HTML page fetcher
//! - `extract`: text and table extraction
//! - `links`: download-link resolution on content pages
//! - `browser`: headless-browser table scraping

pub mod browser;
mod cookies;
mod extract;
mod http_client;
mod links;
mod page;

pub use cookies::{load_cookies, parse_cookies, SessionCookie};
pub use extract::{
    is_valid_row, normalize_header, scrape_table, scrape_text, TableRow, DEFAULT_TABLE_HEADERS,
};
pub use http_client::{
    parse_content_disposition_filename, FetchError, FetchedFile, Fetcher, HttpClient, USER_AGENT,
};
pub use links::{extract_download_links, DownloadLink, LinkResolver};
pub use page::{looks_like_html, PageFetcher};

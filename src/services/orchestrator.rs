//! Per-tender acquisition.
//!
//! Walks a tender's category links in code order and, per category, scrapes
//! page content into the tender row, downloads attachments, or both. One
//! category failing never stops the others; every category ends up in one of
//! the four result buckets with a reason.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::download::{DownloadOutcome, Downloader, FileUploader};
use super::error::PipelineError;
use crate::config::Settings;
use crate::models::{
    display_name, is_content_page_url, resolve_action, ButtonAction, ContentColumn,
    ContentFormat, DocumentLink, NewDocument, Tender,
};
use crate::repository::{DocumentStore, RepositoryError, TenderStore};
use crate::scrapers::browser::DynamicTableScraper;
use crate::scrapers::{
    extract_download_links, scrape_table, scrape_text, DownloadLink, Fetcher, LinkResolver,
    PageFetcher, TableRow,
};
use crate::storage::BlobStore;
use crate::utils::{with_retry, RetryPolicy};

/// Reasons attached to skipped and failed categories.
pub mod reasons {
    pub const MISSING_URL: &str = "missing_url";
    pub const CONTENT_ALREADY_EXISTS: &str = "content_already_exists";
    pub const ALREADY_DOWNLOADED: &str = "already_downloaded";
    pub const NO_DOWNLOAD_LINK_ON_PAGE: &str = "no_download_link_on_page";
    pub const UNKNOWN_TYPE_NO_CONTENT: &str = "unknown_type_no_content";
    pub const UNKNOWN_TYPE_FETCH_FAILED: &str = "unknown_type_fetch_failed";
    pub const HTML_UNAVAILABLE: &str = "html_unavailable";
    pub const CONTENT_NOT_EXTRACTED: &str = "content_not_extracted";
}

/// Message returned for tenders without any category links.
pub const NO_LINKS_MESSAGE: &str = "no links";

/// Content written into a tender column (or a content document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentScraped {
    pub doc_type: String,
    pub column: Option<String>,
    pub format: String,
    /// Characters for text, rows for tables.
    pub size: usize,
}

/// A skipped or failed category, or a single link within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOutcome {
    pub doc_type: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Everything that happened while processing one tender.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TenderResult {
    pub tender_id: i64,
    pub downloaded: Vec<DownloadOutcome>,
    pub content_scraped: Vec<ContentScraped>,
    pub failed: Vec<CategoryOutcome>,
    pub skipped: Vec<CategoryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TenderResult {
    fn new(tender_id: i64) -> Self {
        Self {
            tender_id,
            ..Default::default()
        }
    }

    fn skip(&mut self, doc_type: &str, reason: &str, url: Option<&str>) {
        self.skipped.push(CategoryOutcome {
            doc_type: doc_type.to_string(),
            reason: reason.to_string(),
            url: url.map(str::to_string),
        });
    }

    fn fail(&mut self, doc_type: &str, reason: impl Into<String>, url: Option<&str>) {
        self.failed.push(CategoryOutcome {
            doc_type: doc_type.to_string(),
            reason: reason.into(),
            url: url.map(str::to_string),
        });
    }
}

/// Scraped content before it is stored.
enum ScrapedContent {
    Text(String),
    Rows(Vec<TableRow>),
}

impl ScrapedContent {
    fn size(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Rows(rows) => rows.len(),
        }
    }

    fn file_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "txt",
            Self::Rows(_) => "json",
        }
    }

    fn stored_value(&self) -> Result<String, PipelineError> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Rows(rows) => Ok(serde_json::to_string(rows).map_err(RepositoryError::from)?),
        }
    }
}

/// Timing and origin knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pause before each category.
    pub category_delay: Duration,
    /// Backoff for page fetches and downloads.
    pub retry: RetryPolicy,
    /// Backoff for browser table scrapes.
    pub browser_retry: RetryPolicy,
    pub site_origin: String,
    pub unpack_tool: String,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            category_delay: settings.category_delay(),
            retry: settings.retry.policy(),
            browser_retry: settings.browser_retry_policy(),
            site_origin: settings.site_origin.clone(),
            unpack_tool: settings.unpack_tool.clone(),
        }
    }
}

/// Per-call state: the tender as it is being filled in and its dedup set.
struct TenderRun {
    tender: Tender,
    downloaded_urls: HashSet<String>,
    result: TenderResult,
}

impl TenderRun {
    fn record_download(&mut self, outcome: DownloadOutcome) {
        self.downloaded_urls.insert(outcome.source_url.clone());
        self.result.downloaded.push(outcome);
    }
}

/// Acquires every document of a tender.
pub struct TenderProcessor {
    tenders: Arc<dyn TenderStore>,
    documents: Arc<dyn DocumentStore>,
    pages: PageFetcher,
    links: LinkResolver,
    downloader: Downloader,
    tables: Option<DynamicTableScraper>,
    options: PipelineOptions,
}

impl TenderProcessor {
    pub fn new(
        tenders: Arc<dyn TenderStore>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn Fetcher>,
        options: PipelineOptions,
    ) -> Self {
        let pages = PageFetcher::new(fetcher.clone(), options.retry);
        let links = LinkResolver::new(pages.clone(), options.site_origin.clone());
        let uploader = FileUploader::new(blobs, documents.clone());
        let downloader = Downloader::new(fetcher, uploader, &options.unpack_tool);
        Self {
            tenders,
            documents,
            pages,
            links,
            downloader,
            tables: None,
            options,
        }
    }

    /// Render goods lists through a headless browser before the static fallback.
    pub fn with_table_scraper(mut self, tables: DynamicTableScraper) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn link_resolver(&self) -> &LinkResolver {
        &self.links
    }

    /// Download a single URL for a tender category.
    pub async fn download_and_store(
        &self,
        tender_id: i64,
        doc_type: &str,
        url: &str,
        name: Option<&str>,
        ext_hint: Option<&str>,
    ) -> Result<DownloadOutcome, PipelineError> {
        self.downloader
            .download_and_store(tender_id, doc_type, url, name, ext_hint)
            .await
    }

    /// Every attachment linked from a content page.
    pub async fn resolve_all_download_urls(&self, page_url: &str) -> Vec<DownloadLink> {
        self.links.resolve_all_download_urls(page_url).await
    }

    /// Acquire all category links of a tender.
    ///
    /// A missing tender is an error; anything going wrong inside a category
    /// is recorded in the result instead.
    pub async fn process_tender(&self, tender_id: i64) -> Result<TenderResult, PipelineError> {
        let tender = self
            .tenders
            .get_tender(tender_id)
            .await?
            .ok_or(PipelineError::TenderNotFound(tender_id))?;

        let mut result = TenderResult::new(tender_id);
        if tender.document_links.is_empty() {
            warn!("Tender {}: no document links", tender_id);
            result.message = Some(NO_LINKS_MESSAGE.to_string());
            return Ok(result);
        }

        let downloaded_urls = self.documents.downloaded_source_urls(tender_id).await?;
        let links = tender.document_links.clone();
        let mut run = TenderRun {
            tender,
            downloaded_urls,
            result,
        };

        for (code, link) in &links {
            let Some(url) = link.url() else {
                warn!("Tender {} {}: link has no URL", tender_id, code);
                run.result.skip(code, reasons::MISSING_URL, None);
                continue;
            };

            let action = resolve_action(code, url);
            info!("Tender {} {}: {} {}", tender_id, code, action.name(), url);
            tokio::time::sleep(self.options.category_delay).await;

            if let Err(e) = self.process_category(&mut run, code, url, link, action).await {
                error!("Tender {} {}: {}", tender_id, code, e);
                run.result.fail(code, e.to_string(), None);
            }
        }

        let result = run.result;
        if !result.downloaded.is_empty() {
            match self.documents.count_pending(tender_id).await {
                Ok((count, size)) => debug!(
                    "Tender {}: {} pending documents stored ({:.2} MB)",
                    tender_id,
                    count,
                    size as f64 / 1024.0 / 1024.0
                ),
                Err(e) => warn!("Tender {}: could not verify stored documents: {}", tender_id, e),
            }
        }

        info!(
            "Tender {} done: {} downloaded, {} content, {} failed, {} skipped",
            tender_id,
            result.downloaded.len(),
            result.content_scraped.len(),
            result.failed.len(),
            result.skipped.len()
        );
        Ok(result)
    }

    async fn process_category(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        link: &DocumentLink,
        action: ButtonAction,
    ) -> Result<(), PipelineError> {
        match action {
            ButtonAction::ContentScrape {
                column,
                format,
                label,
            } => {
                self.scrape_content(run, code, url, link, column, format, label)
                    .await
            }
            ButtonAction::ContentAndDownload { column, label, .. } => {
                self.scrape_and_download(run, code, url, link, column, label)
                    .await
            }
            ButtonAction::Download => self.download_category(run, code, url, link).await,
            ButtonAction::Unknown => self.process_unknown(run, code, url, link).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn scrape_content(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        link: &DocumentLink,
        column: ContentColumn,
        format: ContentFormat,
        label: &str,
    ) -> Result<(), PipelineError> {
        if run.tender.has_content(column) {
            debug!("{}: {} already filled", code, column.column_name());
            run.result
                .skip(code, reasons::CONTENT_ALREADY_EXISTS, None);
            return Ok(());
        }

        let rendered = match format {
            ContentFormat::JsonTable => self.scrape_dynamic_table(url).await,
            _ => None,
        };

        let content = match rendered {
            Some(rows) => ScrapedContent::Rows(rows),
            None => {
                let Some(html) = self.pages.fetch_html(url).await else {
                    run.result.fail(code, reasons::HTML_UNAVAILABLE, None);
                    return Ok(());
                };

                let extracted = match format {
                    ContentFormat::JsonTable => scrape_table(&html).map(ScrapedContent::Rows),
                    _ => scrape_text(&html).map(ScrapedContent::Text),
                };
                match extracted {
                    Some(content) => content,
                    None => {
                        let downloads = extract_download_links(&html, self.links.site_origin());
                        if downloads.is_empty() {
                            run.result.fail(code, reasons::CONTENT_NOT_EXTRACTED, None);
                        } else {
                            info!(
                                "{}: no content but {} download links, downloading instead",
                                code,
                                downloads.len()
                            );
                            self.download_links(run, code, &downloads, link, None).await;
                        }
                        return Ok(());
                    }
                }
            }
        };

        self.persist_content(run, code, url, column, format, label, content)
            .await
    }

    async fn scrape_and_download(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        link: &DocumentLink,
        column: ContentColumn,
        label: &str,
    ) -> Result<(), PipelineError> {
        let Some(html) = self.pages.fetch_html(url).await else {
            run.result.fail(code, reasons::HTML_UNAVAILABLE, None);
            return Ok(());
        };

        if run.tender.has_content(column) {
            debug!(
                "{}: {} already filled, only looking for downloads",
                code,
                column.column_name()
            );
        } else if let Some(text) = scrape_text(&html) {
            self.persist_content(
                run,
                code,
                url,
                column,
                ContentFormat::Text,
                label,
                ScrapedContent::Text(text),
            )
            .await?;
        }

        let downloads = extract_download_links(&html, self.links.site_origin());
        if !downloads.is_empty() {
            info!("{}: {} download links on page", code, downloads.len());
            self.download_links(run, code, &downloads, link, None).await;
        }
        Ok(())
    }

    async fn download_category(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        link: &DocumentLink,
    ) -> Result<(), PipelineError> {
        if run.downloaded_urls.contains(url) {
            debug!("{}: already downloaded", code);
            run.result.skip(code, reasons::ALREADY_DOWNLOADED, None);
            return Ok(());
        }

        let hint = link.extension_hint();
        if is_content_page_url(url) {
            info!("{}: content page, resolving download links", code);
            let resolved = self.links.resolve_all_download_urls(url).await;
            if resolved.is_empty() {
                run.result
                    .skip(code, reasons::NO_DOWNLOAD_LINK_ON_PAGE, None);
            } else {
                self.download_links(run, code, &resolved, link, hint.as_deref())
                    .await;
            }
            return Ok(());
        }

        let outcome = self
            .download_with_retry(
                run.tender.id,
                code,
                url,
                link.name.as_deref(),
                hint.as_deref(),
            )
            .await?;
        run.record_download(outcome);
        Ok(())
    }

    async fn process_unknown(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        link: &DocumentLink,
    ) -> Result<(), PipelineError> {
        if run.downloaded_urls.contains(url) {
            run.result.skip(code, reasons::ALREADY_DOWNLOADED, None);
            return Ok(());
        }

        if !is_content_page_url(url) {
            let outcome = self
                .download_with_retry(run.tender.id, code, url, link.name.as_deref(), None)
                .await?;
            run.record_download(outcome);
            return Ok(());
        }

        info!("{}: unknown category on a content page, looking for downloads", code);
        let resolved = self.links.resolve_all_download_urls(url).await;
        if !resolved.is_empty() {
            self.download_links(run, code, &resolved, link, None).await;
            return Ok(());
        }

        let Some(html) = self.pages.fetch_html(url).await else {
            run.result
                .skip(code, reasons::UNKNOWN_TYPE_FETCH_FAILED, None);
            return Ok(());
        };
        let Some(text) = scrape_text(&html) else {
            run.result
                .skip(code, reasons::UNKNOWN_TYPE_NO_CONTENT, None);
            return Ok(());
        };

        let size = text.chars().count();
        let mut doc = NewDocument::content(
            run.tender.id,
            code,
            &format!("{} (içerik)", display_name(code)),
            url,
            "txt",
            text.len() as u64,
        );
        doc.content_text = Some(text);
        self.documents.upsert_document(&doc).await?;
        info!("{}: stored as content ({} chars)", code, size);

        run.result.content_scraped.push(ContentScraped {
            doc_type: code.to_string(),
            column: None,
            format: ContentFormat::Text.as_str().to_string(),
            size,
        });
        Ok(())
    }

    /// Render the goods grid in the browser, if one is configured.
    async fn scrape_dynamic_table(&self, url: &str) -> Option<Vec<TableRow>> {
        let tables = self.tables.as_ref()?;
        match with_retry(self.options.browser_retry, move || tables.scrape(url)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Browser scrape of {} failed, using static HTML: {}", url, e);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_content(
        &self,
        run: &mut TenderRun,
        code: &str,
        url: &str,
        column: ContentColumn,
        format: ContentFormat,
        label: &str,
        content: ScrapedContent,
    ) -> Result<(), PipelineError> {
        let value = content.stored_value()?;
        let size = content.size();

        if !self
            .tenders
            .write_content(run.tender.id, column, &value)
            .await?
        {
            return Err(PipelineError::TenderNotFound(run.tender.id));
        }

        let doc = NewDocument::content(
            run.tender.id,
            code,
            &format!("{} (içerik)", label),
            url,
            content.file_type(),
            value.len() as u64,
        );
        self.documents.upsert_document(&doc).await?;
        run.tender.set_content(column, Some(value));

        info!(
            "{}: content saved to {} ({} {})",
            code,
            column.column_name(),
            size,
            match content {
                ScrapedContent::Text(_) => "chars",
                ScrapedContent::Rows(_) => "rows",
            }
        );
        run.result.content_scraped.push(ContentScraped {
            doc_type: code.to_string(),
            column: Some(column.column_name().to_string()),
            format: format.as_str().to_string(),
            size,
        });
        Ok(())
    }

    /// Download each link independently; one failure does not stop the rest.
    async fn download_links(
        &self,
        run: &mut TenderRun,
        code: &str,
        links: &[DownloadLink],
        link: &DocumentLink,
        ext_hint: Option<&str>,
    ) {
        for download in links {
            if run.downloaded_urls.contains(&download.url) {
                run.result
                    .skip(code, reasons::ALREADY_DOWNLOADED, Some(&download.url));
                continue;
            }

            let name = download.name.as_deref().or(link.name.as_deref());
            match self
                .download_with_retry(run.tender.id, code, &download.url, name, ext_hint)
                .await
            {
                Ok(outcome) => run.record_download(outcome),
                Err(e) => {
                    warn!("{}: download of {} failed: {}", code, download.url, e);
                    run.result.fail(code, e.to_string(), Some(&download.url));
                }
            }
        }
    }

    async fn download_with_retry(
        &self,
        tender_id: i64,
        code: &str,
        url: &str,
        name: Option<&str>,
        ext_hint: Option<&str>,
    ) -> Result<DownloadOutcome, PipelineError> {
        let downloader = &self.downloader;
        with_retry(self.options.retry, move || {
            downloader.download_and_store(tender_id, code, url, name, ext_hint)
        })
        .await
    }
}

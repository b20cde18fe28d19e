//! End-to-end tender processing against a scripted site.
//!
//! The network and browser are fakes; persistence and blob storage are the
//! real SQLite and filesystem backends inside a scratch directory.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use tenderacquire::config::BrowserSettings;
use tenderacquire::models::{DocumentLink, DocumentLinks, SourceKind, Tender};
use tenderacquire::repository::SqliteRepository;
use tenderacquire::scrapers::browser::{
    BrowserError, BrowserPage, BrowserSession, DynamicTableScraper, SHOW_ALL_ROWS_SCRIPT,
};
use tenderacquire::scrapers::{FetchError, Fetcher, SessionCookie};
use tenderacquire::services::{
    reasons, AnalysisQueue, PipelineError, PipelineOptions, TenderProcessor, NO_LINKS_MESSAGE,
};
use tenderacquire::storage::LocalBlobStore;
use tenderacquire::utils::RetryPolicy;

const ORIGIN: &str = "https://site";
const TENDER_ID: i64 = 1;

/// Serves canned bodies by URL and records every request.
#[derive(Default)]
struct FakeSite {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSite {
    fn with(bodies: &[(&str, Vec<u8>)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// Browser whose table script returns fixed rows.
struct FakeBrowser {
    rows: Option<serde_json::Value>,
}

struct FakePage {
    rows: serde_json::Value,
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn set_cookies(&self, _cookies: &[SessionCookie]) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        if script == SHOW_ALL_ROWS_SCRIPT {
            Ok(json!(true))
        } else {
            Ok(self.rows.clone())
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn acquire_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        match &self.rows {
            Some(rows) => Ok(Box::new(FakePage { rows: rows.clone() })),
            None => Err(BrowserError::Unavailable("no browser".to_string())),
        }
    }

    fn session_cookies(&self) -> Vec<SessionCookie> {
        Vec::new()
    }
}

struct Harness {
    _dir: TempDir,
    repo: Arc<SqliteRepository>,
    site: Arc<FakeSite>,
    processor: TenderProcessor,
}

fn options() -> PipelineOptions {
    PipelineOptions {
        category_delay: Duration::ZERO,
        retry: RetryPolicy::new(0, Duration::ZERO),
        browser_retry: RetryPolicy::new(0, Duration::ZERO),
        site_origin: ORIGIN.to_string(),
        unpack_tool: "tenderacquire-test-missing-unrar".to_string(),
    }
}

fn harness(bodies: &[(&str, Vec<u8>)]) -> Harness {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(SqliteRepository::new(&dir.path().join("tenders.db")).unwrap());
    let blobs = Arc::new(LocalBlobStore::new(
        dir.path().join("blobs"),
        Some("https://cdn.test".to_string()),
        Some("secret".to_string()),
    ));
    let site = Arc::new(FakeSite::with(bodies));
    let processor = TenderProcessor::new(
        repo.clone(),
        repo.clone(),
        blobs,
        site.clone(),
        options(),
    );
    Harness {
        _dir: dir,
        repo,
        site,
        processor,
    }
}

impl Harness {
    fn with_browser(mut self, rows: Option<serde_json::Value>) -> Self {
        let settings = BrowserSettings {
            render_pause_ms: 0,
            ..BrowserSettings::default()
        };
        let scraper = DynamicTableScraper::new(Arc::new(FakeBrowser { rows }), settings);
        self.processor = self.processor.with_table_scraper(scraper);
        self
    }

    fn add_tender(&self, links: &[(&str, &str)]) {
        let links: DocumentLinks = links
            .iter()
            .map(|(code, url)| (code.to_string(), DocumentLink::new(*url)))
            .collect();
        self.repo
            .insert_tender(&Tender::new(TENDER_ID, links))
            .unwrap();
    }
}

fn pdf(marker: &str) -> Vec<u8> {
    format!("%PDF-1.4\n{}\n%%EOF", marker).into_bytes()
}

fn html(body: &str) -> Vec<u8> {
    format!("<!DOCTYPE html><html><body>{}</body></html>", body).into_bytes()
}

fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, opts).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_empty_links_make_no_requests() {
    let h = harness(&[]);
    h.add_tender(&[]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.message.as_deref(), Some(NO_LINKS_MESSAGE));
    assert!(result.downloaded.is_empty());
    assert!(result.failed.is_empty());
    assert!(result.skipped.is_empty());
    assert!(h.site.calls().is_empty());
}

#[tokio::test]
async fn test_missing_tender_is_an_error() {
    let h = harness(&[]);
    let err = h.processor.process_tender(404).await.unwrap_err();
    assert!(matches!(err, PipelineError::TenderNotFound(404)));
}

#[tokio::test]
async fn test_content_page_wrapper_resolves_single_download() {
    let page = "https://site/tender/1/8";
    let file = "https://site/tender/1/download?hash=abc";
    let h = harness(&[
        (
            page,
            html(r#"<div class="card"><a href="/tender/1/download?hash=abc">Teknik Şartname</a></div>"#),
        ),
        (file, pdf("tech")),
    ]);
    h.add_tender(&[("tech_spec", page)]);

    let links = h.processor.resolve_all_download_urls(page).await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, file);
    h.site.reset_calls();

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert_eq!(result.downloaded.len(), 1);
    assert!(result.content_scraped.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(
        h.site.calls().iter().filter(|u| u.as_str() == file).count(),
        1
    );

    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.doc_type, "tech_spec");
    assert_eq!(doc.source_kind, SourceKind::Download);
    assert_eq!(doc.source_url, file);
    assert_eq!(doc.file_type, "pdf");
    assert!(!doc.is_extracted);
    assert!(doc.storage_url.as_deref().unwrap().starts_with("https://cdn.test/tenders/1/tech_spec/"));
}

#[tokio::test]
async fn test_card_body_text_is_scraped_into_column() {
    let page = "https://site/tender/1/3";
    let h = harness(&[(
        page,
        html(r#"<div class="card-body"><p>Hizmet alımı ihalesi</p><p>Son teklif tarihi 12.11.2026</p></div>"#),
    )]);
    h.add_tender(&[("announcement", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert!(result.downloaded.is_empty());
    assert_eq!(result.content_scraped.len(), 1);
    let scraped = &result.content_scraped[0];
    assert_eq!(scraped.doc_type, "announcement");
    assert_eq!(scraped.column.as_deref(), Some("announcement_content"));
    assert_eq!(scraped.format, "text");

    let tender = h.repo.tender(TENDER_ID).unwrap().unwrap();
    let content = tender.announcement_content.unwrap();
    assert!(content.contains("Hizmet alımı ihalesi"));
    assert!(content.contains("12.11.2026"));

    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source_kind, SourceKind::Content);
    assert_eq!(docs[0].original_filename, "İhale İlanı (içerik)");
    assert!(docs[0].storage_path.is_none());

    // Filled columns are not scraped again.
    h.site.reset_calls();
    let rerun = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert_eq!(rerun.skipped.len(), 1);
    assert_eq!(rerun.skipped[0].reason, reasons::CONTENT_ALREADY_EXISTS);
    assert!(h.site.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_skips_downloaded_categories_without_fetching() {
    let h = harness(&[
        ("https://site/files/teknik.pdf", pdf("tech")),
        ("https://site/download?id=2", pdf("admin")),
    ]);
    h.add_tender(&[
        ("tech_spec", "https://site/files/teknik.pdf"),
        ("admin_spec", "https://site/download?id=2"),
    ]);

    let first = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert_eq!(first.downloaded.len(), 2);
    // Categories run in code order.
    assert_eq!(first.downloaded[0].doc_type, "admin_spec");
    assert_eq!(first.downloaded[1].doc_type, "tech_spec");

    h.site.reset_calls();
    let second = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert!(second.downloaded.is_empty());
    assert!(second.failed.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert!(second
        .skipped
        .iter()
        .all(|s| s.reason == reasons::ALREADY_DOWNLOADED));
    assert!(h.site.calls().is_empty());
    assert_eq!(h.repo.documents_for_tender(TENDER_ID).unwrap().len(), 2);
}

#[tokio::test]
async fn test_html_payload_is_rejected_and_not_stored() {
    let url = "https://site/files/login.pdf";
    let h = harness(&[(url, b"  <!DOCTYPE html><html>Giris yapin</html>".to_vec())]);
    h.add_tender(&[("tech_spec", url)]);

    let direct = h
        .processor
        .download_and_store(TENDER_ID, "tech_spec", url, None, None)
        .await
        .unwrap_err();
    assert!(matches!(direct, PipelineError::HtmlPayload { .. }));

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert!(result.downloaded.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].doc_type, "tech_spec");
    assert!(result.failed[0].reason.contains("HTML"));
    assert!(h.repo.documents_for_tender(TENDER_ID).unwrap().is_empty());
}

#[tokio::test]
async fn test_zip_children_link_to_parent_and_parent_is_never_queued() {
    let url = "https://site/files/proje.zip";
    let archive = zip_archive(&[
        ("Teknik Şartname.pdf", b"%PDF-1.4 teknik"),
        ("Birim Fiyat Teklif Cetveli.pdf", b"%PDF-1.4 birim"),
        ("__MACOSX/._Teknik Şartname.pdf", b"junk"),
        ("setup.exe", b"MZ"),
    ]);
    let h = harness(&[(url, archive)]);
    h.add_tender(&[("project_files", url)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.downloaded[0].files_count, 3);

    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 3);
    let parent = docs.iter().find(|d| d.is_zip_parent).unwrap();
    assert_eq!(parent.file_type, "zip");
    assert_eq!(parent.original_filename, "Proje Dosyaları.zip");
    assert_eq!(parent.source_url, url);

    let children: Vec<_> = docs.iter().filter(|d| !d.is_zip_parent).collect();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert!(child.is_extracted);
        assert_eq!(child.parent_doc_id, Some(parent.id));
        assert!(child.source_url.starts_with("https://site/files/proje.zip#file="));
    }
    assert!(children.iter().any(|c| c.doc_type == "tech_spec"));
    assert!(children.iter().any(|c| c.doc_type == "unit_price"));

    let queue = AnalysisQueue::new(h.repo.clone());
    let err = queue.enqueue(parent.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::ArchiveNotQueueable { .. }));

    let all: Vec<i64> = docs.iter().map(|d| d.id).collect();
    let mut expected: Vec<i64> = children.iter().map(|c| c.id).collect();
    expected.sort();
    assert_eq!(queue.enqueue_many(&all).await.unwrap(), expected);
}

#[tokio::test]
async fn test_rar_without_unpack_tool_is_stored_as_parent() {
    let url = "https://site/files/proje.rar";
    let mut archive = b"Rar!\x1a\x07\x00".to_vec();
    archive.extend_from_slice(&[0u8; 64]);
    let h = harness(&[(url, archive)]);
    h.add_tender(&[("project_files", url)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert!(result.failed.is_empty());
    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.downloaded[0].files_count, 1);

    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert!(doc.is_zip_parent);
    assert_eq!(doc.file_type, "rar");
    assert_eq!(doc.original_filename, "Proje Dosyaları.rar");
    assert_eq!(doc.source_url, url);

    let queue = AnalysisQueue::new(h.repo.clone());
    let err = queue.enqueue(doc.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::ArchiveNotQueueable { .. }));
}

#[tokio::test]
async fn test_one_failing_category_does_not_stop_others() {
    let h = harness(&[("https://site/files/idari.pdf", pdf("admin"))]);
    h.add_tender(&[
        ("admin_spec", "https://site/files/idari.pdf"),
        ("tech_spec", "https://site/files/missing.pdf"),
        ("contract", ""),
    ]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.downloaded[0].doc_type, "admin_spec");
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].doc_type, "tech_spec");
    assert!(result.failed[0].reason.contains("404"));
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].doc_type, "contract");
    assert_eq!(result.skipped[0].reason, reasons::MISSING_URL);
}

#[tokio::test]
async fn test_content_page_without_links_is_skipped() {
    let page = "https://site/tender/1/9";
    let h = harness(&[(page, html("<p>Belge henüz yüklenmedi</p>"))]);
    h.add_tender(&[("tech_spec", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert!(result.downloaded.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, reasons::NO_DOWNLOAD_LINK_ON_PAGE);
}

#[tokio::test]
async fn test_content_page_without_text_downloads_links_instead() {
    let page = "https://site/tender/1/3";
    let file = "https://site/download?hash=x";
    let h = harness(&[
        (page, html(r#"<a href="/download?hash=x"></a>"#)),
        (file, pdf("ilan")),
    ]);
    h.add_tender(&[("announcement", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert!(result.content_scraped.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.downloaded[0].doc_type, "announcement");
    assert_eq!(result.downloaded[0].source_url, file);

    let tender = h.repo.tender(TENDER_ID).unwrap().unwrap();
    assert!(tender.announcement_content.is_none());
    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source_kind, SourceKind::Download);
    assert_eq!(docs[0].file_type, "pdf");
}

#[tokio::test]
async fn test_null_link_in_stored_map_is_skipped() {
    let h = harness(&[("https://site/files/idari.pdf", pdf("admin"))]);
    let links: DocumentLinks = serde_json::from_value(json!({
        "admin_spec": "https://site/files/idari.pdf",
        "tech_spec": null
    }))
    .unwrap();
    h.repo.insert_tender(&Tender::new(TENDER_ID, links)).unwrap();

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].doc_type, "tech_spec");
    assert_eq!(result.skipped[0].reason, reasons::MISSING_URL);
}

#[tokio::test]
async fn test_unknown_category_content_is_stored_as_document() {
    let page = "https://site/tender/1/12";
    let h = harness(&[(
        page,
        html(r#"<div class="card-body">Yaklaşık maliyet bilgisi paylaşılmamıştır.</div>"#),
    )]);
    h.add_tender(&[("other_info", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();
    assert_eq!(result.content_scraped.len(), 1);
    assert_eq!(result.content_scraped[0].column, None);

    let docs = h.repo.documents_for_tender(TENDER_ID).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].original_filename, "other info (içerik)");
    assert!(docs[0]
        .content_text
        .as_deref()
        .unwrap()
        .contains("Yaklaşık maliyet"));
}

#[tokio::test]
async fn test_goods_list_rendered_by_browser() {
    let page = "https://site/tender/1/5";
    let h = harness(&[]).with_browser(Some(json!([
        {"sira": "1", "malzeme_adi": "Toner", "miktar": "10"},
        {"sira": "2", "malzeme_adi": "Kağıt", "miktar": "200"},
        {"sira": "3"}
    ])));
    h.add_tender(&[("goods_list", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.content_scraped.len(), 1);
    assert_eq!(result.content_scraped[0].format, "json_table");
    assert_eq!(result.content_scraped[0].size, 2);
    assert!(h.site.calls().is_empty());

    let tender = h.repo.tender(TENDER_ID).unwrap().unwrap();
    let rows: Vec<HashMap<String, String>> =
        serde_json::from_str(&tender.goods_services_content.unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["malzeme_adi"], "Kağıt");
}

#[tokio::test]
async fn test_goods_list_falls_back_to_static_table() {
    let page = "https://site/tender/1/5";
    let table = r#"
        <table><tr><td>x</td></tr></table>
        <table>
            <tr><th>#</th><th>Kalem</th><th>Miktar</th></tr>
            <tr><td>1</td><td>Toner</td><td>10</td></tr>
            <tr><td>2</td><td></td><td></td></tr>
        </table>"#;
    let h = harness(&[(page, html(table))]).with_browser(None);
    h.add_tender(&[("goods_list", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.content_scraped.len(), 1);
    assert_eq!(result.content_scraped[0].size, 1);
    let tender = h.repo.tender(TENDER_ID).unwrap().unwrap();
    let rows: Vec<HashMap<String, String>> =
        serde_json::from_str(&tender.goods_services_content.unwrap()).unwrap();
    assert_eq!(rows[0]["sira"], "1");
    assert_eq!(rows[0]["kalem"], "Toner");
}

#[tokio::test]
async fn test_zeyilname_scrapes_text_and_downloads_attachments() {
    let page = "https://site/tender/1/7";
    let file = "https://site/files/zeyilname-1.pdf";
    let h = harness(&[
        (
            page,
            html(r#"<div class="card-body">Teklif tarihi ertelenmiştir. <a href="/files/zeyilname-1.pdf">Zeyilname 1</a></div>"#),
        ),
        (file, pdf("zeyil")),
    ]);
    h.add_tender(&[("zeyilname", page)]);

    let result = h.processor.process_tender(TENDER_ID).await.unwrap();

    assert_eq!(result.content_scraped.len(), 1);
    assert_eq!(
        result.content_scraped[0].column.as_deref(),
        Some("zeyilname_content")
    );
    assert_eq!(result.downloaded.len(), 1);
    assert_eq!(result.downloaded[0].source_url, file);

    let tender = h.repo.tender(TENDER_ID).unwrap().unwrap();
    assert!(tender
        .zeyilname_content
        .unwrap()
        .contains("Teklif tarihi ertelenmiştir"));
}

//! Single-document download and storage.
//!
//! Fetches a file, guards against HTML error pages posing as files, works out
//! its real type and stores it (unpacking archives first).

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::archive::ArchiveExtractor;
use super::error::PipelineError;
use crate::models::{display_name, NewDocument, StoredFile};
use crate::repository::DocumentStore;
use crate::scrapers::Fetcher;
use crate::storage::{storage_key, BlobStore};
use crate::utils::{
    content_type_for_extension, detect_file_type, extension_from_url, is_archive_extension,
    sanitize_file_name,
};

/// Leading bytes inspected by the HTML guard.
const HTML_SNIFF_LEN: usize = 500;

/// Extension used when nothing else identifies the file.
const DEFAULT_EXTENSION: &str = ".pdf";

/// Whether a payload is an HTML or XML page rather than a document.
pub fn is_html_payload(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HTML_SNIFF_LEN)];
    let text = String::from_utf8_lossy(head).trim().to_lowercase();
    ["<!doctype", "<html", "<?xml"]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

/// Normalize an extension hint to a dotted, lowercased form.
fn normalize_extension(hint: &str) -> Option<String> {
    let trimmed = hint.trim().trim_start_matches('.');
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// Pick the extension for a payload: signature, then hint, then URL, then PDF.
pub fn choose_extension(bytes: &[u8], hint: Option<&str>, url: &str) -> String {
    detect_file_type(bytes)
        .map(str::to_string)
        .or_else(|| hint.and_then(normalize_extension))
        .or_else(|| extension_from_url(url))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// One file to push through blob storage and the documents table.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub tender_id: i64,
    pub doc_type: &'a str,
    pub bytes: &'a [u8],
    /// Dotted extension.
    pub extension: &'a str,
    pub display_name: &'a str,
    pub source_url: &'a str,
    pub is_extracted: bool,
    pub is_zip_parent: bool,
}

/// Upload primitive shared by single downloads and archive entries.
#[derive(Clone)]
pub struct FileUploader {
    blobs: Arc<dyn BlobStore>,
    documents: Arc<dyn DocumentStore>,
}

impl FileUploader {
    pub fn new(blobs: Arc<dyn BlobStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { blobs, documents }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Store the bytes and upsert a pending download document for them.
    pub async fn upload(&self, request: UploadRequest<'_>) -> Result<StoredFile, PipelineError> {
        let display = sanitize_file_name(request.display_name);
        let display = if display.is_empty() {
            let random = uuid::Uuid::new_v4().simple().to_string();
            format!("doc-{}", &random[..8])
        } else {
            display
        };

        let key = storage_key(
            request.tender_id,
            request.doc_type,
            &display,
            request.extension,
        );
        let storage_file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
        let content_type = content_type_for_extension(request.extension);

        let blob = self.blobs.upload(&key, request.bytes, content_type).await?;

        let mut doc = NewDocument::download(
            request.tender_id,
            request.doc_type,
            &display,
            request.source_url,
            request.extension,
            request.bytes.len() as u64,
        );
        doc.filename = storage_file_name;
        doc.storage_path = Some(blob.path.clone());
        doc.storage_url = Some(blob.public_url.clone());
        doc.is_extracted = request.is_extracted;
        doc.is_zip_parent = request.is_zip_parent;

        let stored = self.documents.upsert_document(&doc).await?;
        debug!(
            "Document saved: id={} path={} new={}",
            stored.id, blob.path, stored.is_new
        );

        Ok(StoredFile {
            document_id: stored.id,
            storage_path: stored.storage_path.unwrap_or(blob.path),
            storage_url: stored.storage_url.unwrap_or(blob.public_url),
            file_name: display,
            file_size: request.bytes.len() as u64,
            file_type: request.extension.to_string(),
            doc_type: request.doc_type.to_string(),
            is_extracted: request.is_extracted,
            is_zip_parent: request.is_zip_parent,
        })
    }
}

/// Outcome of storing one downloaded URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub doc_type: String,
    pub source_url: String,
    pub files_count: usize,
    pub total_size: u64,
    pub files: Vec<StoredFile>,
}

impl DownloadOutcome {
    fn new(doc_type: &str, source_url: &str, files: Vec<StoredFile>) -> Self {
        Self {
            doc_type: doc_type.to_string(),
            source_url: source_url.to_string(),
            files_count: files.len(),
            total_size: files.iter().map(|f| f.file_size).sum(),
            files,
        }
    }
}

/// Downloads a URL and stores the file, unpacking archives.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn Fetcher>,
    uploader: FileUploader,
    archives: ArchiveExtractor,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn Fetcher>, uploader: FileUploader, unpack_tool: &str) -> Self {
        let archives = ArchiveExtractor::new(uploader.clone(), unpack_tool);
        Self {
            fetcher,
            uploader,
            archives,
        }
    }

    pub fn uploader(&self) -> &FileUploader {
        &self.uploader
    }

    /// Download `url` and store it under the tender's `doc_type`.
    ///
    /// Fails with [`PipelineError::HtmlPayload`] when the response is a web
    /// page. `ext_hint` is used only when the bytes carry no recognizable
    /// signature. The scratch directory is removed on every exit path.
    pub async fn download_and_store(
        &self,
        tender_id: i64,
        doc_type: &str,
        url: &str,
        name: Option<&str>,
        ext_hint: Option<&str>,
    ) -> Result<DownloadOutcome, PipelineError> {
        info!("Downloading {}: {}", doc_type, url);
        let bytes = self.fetcher.fetch(url).await?;

        if is_html_payload(&bytes) {
            return Err(PipelineError::HtmlPayload {
                url: url.to_string(),
            });
        }

        let extension = choose_extension(&bytes, ext_hint, url);
        debug!("Detected file type {} for {}", extension, url);

        let scratch = tempfile::Builder::new().prefix("tender-doc-").tempdir()?;
        let scratch_file = scratch.path().join(format!("download{}", extension));
        tokio::fs::write(&scratch_file, &bytes).await?;

        let files = if is_archive_extension(&extension) {
            self.archives
                .extract_and_upload(tender_id, doc_type, &scratch_file, url)
                .await?
        } else {
            let fallback = display_name(doc_type);
            let display = name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&fallback);
            let stored = self
                .uploader
                .upload(UploadRequest {
                    tender_id,
                    doc_type,
                    bytes: &bytes,
                    extension: &extension,
                    display_name: display,
                    source_url: url,
                    is_extracted: false,
                    is_zip_parent: false,
                })
                .await?;
            vec![stored]
        };

        Ok(DownloadOutcome::new(doc_type, url, files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_guard() {
        assert!(is_html_payload(b"  \n<!DOCTYPE html><html>"));
        assert!(is_html_payload(b"<HTML><body>login</body>"));
        assert!(is_html_payload(b"<?xml version=\"1.0\"?><error/>"));
        assert!(!is_html_payload(b"%PDF-1.7 <html>"));
        assert!(!is_html_payload(b""));

        let mut late = vec![b' '; 600];
        late.extend_from_slice(b"<html>");
        assert!(!is_html_payload(&late));
    }

    #[test]
    fn test_extension_order() {
        assert_eq!(choose_extension(b"%PDF-1.4", Some(".docx"), "https://s/a.xls"), ".pdf");
        assert_eq!(choose_extension(b"plain", Some("DOCX"), "https://s/a.xls"), ".docx");
        assert_eq!(choose_extension(b"plain", None, "https://s/a.xls"), ".xls");
        assert_eq!(choose_extension(b"plain", Some("..."), "https://s/download?h=1"), ".pdf");
        // OLE compound files defer to the URL.
        let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        assert_eq!(choose_extension(&ole, None, "https://s/f.doc"), ".doc");
    }
}

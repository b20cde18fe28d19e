//! Pipeline-level errors.

use thiserror::Error;

use super::archive::ArchiveError;
use crate::repository::RepositoryError;
use crate::scrapers::browser::BrowserError;
use crate::scrapers::FetchError;
use crate::storage::StorageError;

/// Errors surfaced by the acquisition pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tender not found: {0}")]
    TenderNotFound(i64),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    /// A web page came back where a file was expected (login or error page).
    #[error("Expected a file but {url} returned an HTML page")]
    HtmlPayload { url: String },

    #[error("Archives are never queued for analysis, extract them first: {name} (id {id})")]
    ArchiveNotQueueable { id: i64, name: String },
}

//! Stored tender documents.
//!
//! A document is either a scraped content snapshot (`content`) or a stored
//! file (`download`). Archives are stored alongside their extracted entries,
//! which point back at the archive through `parent_doc_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a document's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Content,
    Download,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Download => "download",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "download" => Some(Self::Download),
            _ => None,
        }
    }
}

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Whether a bare file type ("zip", ".RAR") names an archive.
pub fn is_archive_file_type(file_type: &str) -> bool {
    matches!(
        file_type.trim_start_matches('.').to_lowercase().as_str(),
        "zip" | "rar"
    )
}

/// A persisted document row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub tender_id: i64,
    /// Storage-safe file name.
    pub filename: String,
    /// Display name; unique per tender.
    pub original_filename: String,
    /// Extension without the leading dot.
    pub file_type: String,
    pub file_size: u64,
    pub storage_path: Option<String>,
    pub storage_url: Option<String>,
    pub source_url: String,
    /// Category code.
    pub doc_type: String,
    pub source_kind: SourceKind,
    pub is_extracted: bool,
    pub is_zip_parent: bool,
    pub parent_doc_id: Option<i64>,
    pub processing_status: ProcessingStatus,
    pub content_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn is_archive(&self) -> bool {
        is_archive_file_type(&self.file_type)
    }
}

/// Values for inserting or updating a document row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub tender_id: i64,
    pub filename: String,
    pub original_filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub storage_path: Option<String>,
    pub storage_url: Option<String>,
    pub source_url: String,
    pub doc_type: String,
    pub source_kind: SourceKind,
    pub is_extracted: bool,
    pub is_zip_parent: bool,
    pub processing_status: ProcessingStatus,
    pub content_text: Option<String>,
}

impl NewDocument {
    /// Pending download-kind document backed by a stored blob.
    pub fn download(
        tender_id: i64,
        doc_type: &str,
        original_filename: &str,
        source_url: &str,
        file_type: &str,
        file_size: u64,
    ) -> Self {
        Self {
            tender_id,
            filename: original_filename.to_string(),
            original_filename: original_filename.to_string(),
            file_type: file_type.trim_start_matches('.').to_lowercase(),
            file_size,
            storage_path: None,
            storage_url: None,
            source_url: source_url.to_string(),
            doc_type: doc_type.to_string(),
            source_kind: SourceKind::Download,
            is_extracted: false,
            is_zip_parent: false,
            processing_status: ProcessingStatus::Pending,
            content_text: None,
        }
    }

    /// Completed content-kind document with no backing file.
    pub fn content(
        tender_id: i64,
        doc_type: &str,
        original_filename: &str,
        source_url: &str,
        file_type: &str,
        file_size: u64,
    ) -> Self {
        Self {
            source_kind: SourceKind::Content,
            processing_status: ProcessingStatus::Completed,
            ..Self::download(
                tender_id,
                doc_type,
                original_filename,
                source_url,
                file_type,
                file_size,
            )
        }
    }
}

/// Outcome of an upsert keyed on (tender, display name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedDocument {
    pub id: i64,
    pub storage_path: Option<String>,
    pub storage_url: Option<String>,
    pub is_new: bool,
}

/// A file persisted by the downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub document_id: i64,
    pub storage_path: String,
    pub storage_url: String,
    pub file_name: String,
    pub file_size: u64,
    /// Dotted extension.
    pub file_type: String,
    pub doc_type: String,
    pub is_extracted: bool,
    pub is_zip_parent: bool,
}

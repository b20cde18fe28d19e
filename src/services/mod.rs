//! Service layer for tender document acquisition.
//!
//! This module contains the pipeline logic separated from the CLI:
//! - `download`: single-document download and the shared upload primitive
//! - `archive`: zip/rar extraction and file-name classification
//! - `orchestrator`: per-tender category dispatch
//! - `queue`: hand-off to downstream analysis

pub mod archive;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod queue;

pub use archive::{
    detect_category_from_file_name, repair_entry_name, ArchiveError, ArchiveExtractor,
    ArchiveMember,
};
pub use download::{
    choose_extension, is_html_payload, DownloadOutcome, Downloader, FileUploader, UploadRequest,
};
pub use error::PipelineError;
pub use orchestrator::{
    reasons, CategoryOutcome, ContentScraped, PipelineOptions, TenderProcessor, TenderResult,
    NO_LINKS_MESSAGE,
};
pub use queue::AnalysisQueue;

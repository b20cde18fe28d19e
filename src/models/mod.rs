//! Data models for tender acquisition.

mod category;
mod document;
mod tender;

pub use category::{
    button_type, display_name, is_content_page_url, is_download_url, resolve_action, ButtonAction,
    ButtonTypeConfig, ContentColumn, ContentFormat, Strategy, BUTTON_TYPES,
};
pub use document::{
    is_archive_file_type, Document, NewDocument, ProcessingStatus, SourceKind, StoredFile,
    UpsertedDocument,
};
pub use tender::{DocumentLink, DocumentLinks, Tender};

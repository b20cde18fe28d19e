//! Shared utility functions.
//!
//! This module contains reusable utilities used across the codebase:
//! - `file_type`: File type detection from leading bytes
//! - `html`: Visible-text extraction from parsed HTML
//! - `mime`: Supported extensions and content types
//! - `naming`: Filename sanitizing and storage-safe names
//! - `retry`: Bounded exponential backoff

mod file_type;
mod html;
mod mime;
mod naming;
mod retry;

pub use file_type::detect_file_type;
pub use html::{collapse_whitespace, element_text, fragment_text};
pub use mime::{
    content_type_for_extension, extension_from_url, file_name_extension, is_archive_extension,
    is_supported_extension, SUPPORTED_EXTENSIONS,
};
pub use naming::{fold_turkish_lower, make_url_safe, sanitize_file_name};
pub use retry::{with_retry, RetryPolicy};

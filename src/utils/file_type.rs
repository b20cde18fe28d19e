//! Signature-based file type detection.
//!
//! Servers frequently send attachments as `application/octet-stream` behind
//! opaque `/download/{id}` URLs, so the leading bytes are the most reliable
//! source for the stored extension.

use std::io::Cursor;

use tracing::debug;
use zip::ZipArchive;

use super::mime::SUPPORTED_EXTENSIONS;

const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Detect a dotted extension from the leading bytes of a payload.
///
/// Returns `None` for short buffers, unknown signatures and legacy OLE
/// compound documents (.doc/.xls/.ppt share one container, so the caller
/// falls back to hints or the URL).
pub fn detect_file_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }

    if bytes.starts_with(b"%PDF") {
        return Some(".pdf");
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return Some(classify_zip_container(bytes));
    }
    if bytes.starts_with(b"Rar!") {
        return Some(".rar");
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some(".png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(".jpg");
    }
    if bytes.starts_with(OLE_MAGIC) {
        return None;
    }
    if bytes.starts_with(b"GIF8") {
        return Some(".gif");
    }
    if bytes.starts_with(b"BM") {
        return Some(".bmp");
    }
    if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        return Some(".tiff");
    }

    // Remaining allow-listed formats (7z, webp, rtf, ...) via the infer matchers.
    let kind = infer::get(bytes)?;
    let dotted = format!(".{}", kind.extension());
    SUPPORTED_EXTENSIONS
        .iter()
        .copied()
        .find(|ext| *ext == dotted)
}

/// Tell OOXML documents apart from plain zip archives.
fn classify_zip_container(bytes: &[u8]) -> &'static str {
    let archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => {
            debug!("PK payload is not a readable zip ({}), treating as .zip", e);
            return ".zip";
        }
    };

    let mut has_content_types = false;
    let mut has_word = false;
    let mut has_xl = false;
    let mut has_ppt = false;
    for name in archive.file_names() {
        if name == "[Content_Types].xml" {
            has_content_types = true;
        } else if name.starts_with("word/") {
            has_word = true;
        } else if name.starts_with("xl/") {
            has_xl = true;
        } else if name.starts_with("ppt/") {
            has_ppt = true;
        }
    }

    if !has_content_types {
        return ".zip";
    }
    if has_word {
        ".docx"
    } else if has_xl {
        ".xlsx"
    } else if has_ppt {
        ".pptx"
    } else {
        // Unrecognised OOXML flavour; Word is by far the most common upload.
        ".docx"
    }
}

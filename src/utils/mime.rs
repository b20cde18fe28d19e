//! Supported extensions, content types and URL extension heuristics.

use url::Url;

/// Extensions accepted for storage (documents, archives, images, text, CAD).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".rtf", ".odt", ".ods", ".odp",
    ".zip", ".rar", ".7z", ".jpg", ".jpeg", ".png", ".gif", ".webp", ".tiff", ".tif", ".bmp",
    ".txt", ".csv", ".xml", ".json", ".dwg", ".dxf",
];

/// Check whether a dotted extension (".pdf") is on the storage allow-list.
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Check whether a dotted extension names an archive that gets unpacked.
pub fn is_archive_extension(ext: &str) -> bool {
    matches!(ext.to_lowercase().as_str(), ".zip" | ".rar")
}

/// Map a dotted extension to the content type used for blob uploads.
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        ".pdf" => "application/pdf",
        ".doc" => "application/msword",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xls" => "application/vnd.ms-excel",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".ppt" => "application/vnd.ms-powerpoint",
        ".pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".rtf" => "application/rtf",
        ".odt" => "application/vnd.oasis.opendocument.text",
        ".ods" => "application/vnd.oasis.opendocument.spreadsheet",
        ".odp" => "application/vnd.oasis.opendocument.presentation",
        ".zip" => "application/zip",
        ".rar" => "application/x-rar-compressed",
        ".7z" => "application/x-7z-compressed",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".tif" | ".tiff" => "image/tiff",
        ".bmp" => "image/bmp",
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".xml" => "application/xml",
        ".json" => "application/json",
        ".dwg" => "application/acad",
        ".dxf" => "application/dxf",
        _ => "application/octet-stream",
    }
}

/// Dotted, lowercased extension of a file name, if it has one.
pub fn file_name_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || !ext.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

/// Supported extension taken from a URL path.
///
/// Unparseable URLs fall back to substring guesses: specification pages
/// ("idari", "teknik") are assumed to be PDFs and ".zip" anywhere means a zip.
pub fn extension_from_url(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let last = parsed.path().rsplit('/').next().unwrap_or_default();
            let ext = file_name_extension(last)?;
            is_supported_extension(&ext).then_some(ext)
        }
        Err(_) => {
            if url.contains("idari") || url.contains("teknik") {
                Some(".pdf".to_string())
            } else if url.contains(".zip") {
                Some(".zip".to_string())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(".pdf"));
        assert!(is_supported_extension(".DOCX"));
        assert!(!is_supported_extension(".exe"));
        assert!(!is_supported_extension("pdf"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_extension(".pdf"), "application/pdf");
        assert_eq!(content_type_for_extension(".rar"), "application/x-rar-compressed");
        assert_eq!(content_type_for_extension(".xyz"), "application/octet-stream");
    }

    #[test]
    fn test_file_name_extension() {
        assert_eq!(file_name_extension("Teknik.PDF").as_deref(), Some(".pdf"));
        assert_eq!(file_name_extension("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(file_name_extension("noext"), None);
        assert_eq!(file_name_extension(".hidden"), None);
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://example.com/files/spec.PDF?x=1").as_deref(),
            Some(".pdf")
        );
        assert_eq!(extension_from_url("https://example.com/download/123"), None);
        assert_eq!(extension_from_url("https://example.com/tool.exe"), None);
        assert_eq!(extension_from_url("not a url/teknik").as_deref(), Some(".pdf"));
        assert_eq!(extension_from_url("relative/pack.zip").as_deref(), Some(".zip"));
    }
}

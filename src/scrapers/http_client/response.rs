//! Fetched payloads and response header helpers.

/// A downloaded payload with the metadata the server sent along.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub content_type: Option<String>,
    /// File name from `Content-Disposition`, if present.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Parse the file name from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=charset''encoded` parameter wins over a plain
/// `filename=` one.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim().trim_matches('"');
                if let Some((_, encoded)) = value.split_once("''") {
                    if let Ok(decoded) = urlencoding::decode(encoded) {
                        extended = Some(decoded.trim().to_string());
                    }
                }
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').trim().to_string());
            }
            _ => {}
        }
    }

    extended
        .filter(|n| !n.is_empty())
        .or(plain.filter(|n| !n.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"Teknik.pdf\""),
            Some("Teknik.pdf".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=idari.docx"),
            Some("idari.docx".to_string())
        );
    }

    #[test]
    fn test_extended_filename_preferred() {
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''%C4%B0dari%20%C5%9Eartname.pdf"
            ),
            Some("İdari Şartname.pdf".to_string())
        );
    }

    #[test]
    fn test_no_filename() {
        assert_eq!(parse_content_disposition_filename("inline"), None);
        assert_eq!(parse_content_disposition_filename("attachment; filename=\"\""), None);
    }
}

//! Download-link discovery inside tender content pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::page::PageFetcher;
use crate::models::is_download_url;
use crate::utils::fragment_text;

static FILE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<a[^>]*href=["']([^"']*(?:download|file|\.pdf|\.doc|\.xls|\.zip|\.rar)[^"']*)["'][^>]*>(.*?)</a>"#,
    )
    .unwrap()
});

/// A real attachment link found on a content page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    /// Anchor text, if any.
    pub name: Option<String>,
}

/// Turn an href into an absolute URL; root-relative paths join the site origin.
fn absolutize(href: &str, origin: Option<&Url>) -> String {
    let href = href.trim().replace("&amp;", "&");
    if href.starts_with('/') {
        if let Some(joined) = origin.and_then(|o| o.join(&href).ok()) {
            return joined.to_string();
        }
    }
    href
}

/// Find attachment links in a page, deduplicated by absolute URL.
///
/// Only anchors whose URL independently classifies as a download are kept.
pub fn extract_download_links(html: &str, site_origin: &str) -> Vec<DownloadLink> {
    let origin = Url::parse(site_origin).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for caps in FILE_ANCHOR.captures_iter(html) {
        let url = absolutize(&caps[1], origin.as_ref());
        if !seen.insert(url.clone()) {
            continue;
        }
        if !is_download_url(&url) {
            continue;
        }
        let name = fragment_text(&caps[2]);
        links.push(DownloadLink {
            url,
            name: (!name.is_empty()).then_some(name),
        });
    }

    links
}

/// Resolves content-page wrappers to the files they link.
#[derive(Clone)]
pub struct LinkResolver {
    pages: PageFetcher,
    site_origin: String,
}

impl LinkResolver {
    pub fn new(pages: PageFetcher, site_origin: impl Into<String>) -> Self {
        Self {
            pages,
            site_origin: site_origin.into(),
        }
    }

    pub fn site_origin(&self) -> &str {
        &self.site_origin
    }

    /// First attachment linked from a content page.
    pub async fn resolve_download_url(&self, page_url: &str) -> Option<DownloadLink> {
        self.resolve_all_download_urls(page_url).await.into_iter().next()
    }

    /// Every attachment linked from a content page.
    pub async fn resolve_all_download_urls(&self, page_url: &str) -> Vec<DownloadLink> {
        let Some(html) = self.pages.fetch_html(page_url).await else {
            warn!("Could not load content page {}", page_url);
            return Vec::new();
        };

        let links = extract_download_links(&html, &self.site_origin);
        if links.is_empty() {
            warn!("No download links found on {}", page_url);
        } else {
            info!("Found {} download links on {}", links.len(), page_url);
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://www.ihalebul.com";

    #[test]
    fn test_extracts_and_absolutizes() {
        let html = r#"
            <a class="btn" href="/download?hash=abc&amp;t=1"><i class="fa"></i> Teknik Şartname</a>
            <a href="https://cdn.example.com/files/idari.pdf">İdari</a>
            <a href="/tender/1/8">Not a file</a>
        "#;
        let links = extract_download_links(html, ORIGIN);
        assert_eq!(
            links,
            vec![
                DownloadLink {
                    url: "https://www.ihalebul.com/download?hash=abc&t=1".into(),
                    name: Some("Teknik Şartname".into()),
                },
                DownloadLink {
                    url: "https://cdn.example.com/files/idari.pdf".into(),
                    name: Some("İdari".into()),
                },
            ]
        );
    }

    #[test]
    fn test_deduplicates_repeated_hrefs() {
        let html = r#"
            <a href="/download?hash=abc">one</a>
            <a href='/download?hash=abc'>two</a>
            <a href="https://www.ihalebul.com/download?hash=abc">three</a>
        "#;
        let links = extract_download_links(html, ORIGIN);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name.as_deref(), Some("one"));
    }

    #[test]
    fn test_rejects_file_like_non_downloads() {
        // Matches the anchor pattern ("file") but is not itself a download URL.
        let html = r#"<a href="/profile/files">Files</a><a href="/a.docx"></a>"#;
        let links = extract_download_links(html, ORIGIN);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://www.ihalebul.com/a.docx");
        assert_eq!(links[0].name, None);
    }

    #[test]
    fn test_multiline_anchor_body() {
        let html = "<a\n href=\"/download?hash=z\"\n>\n  Zeyilname\n  Dosyası\n</a>";
        let links = extract_download_links(html, ORIGIN);
        assert_eq!(links[0].name.as_deref(), Some("Zeyilname Dosyası"));
    }
}

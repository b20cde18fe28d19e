//! Tender rows and their per-category document links.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::ContentColumn;
use crate::utils::file_name_extension;

/// Link entry as it appears in stored link maps: either a bare URL or an
/// object carrying a display name and file-name hint. Any other value
/// (`null`, numbers) is kept as a link without a URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawDocumentLink {
    Url(String),
    Detailed {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, alias = "fileName")]
        file_name: Option<String>,
    },
    Other(serde::de::IgnoredAny),
}

/// A category's link on the tender page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDocumentLink")]
pub struct DocumentLink {
    pub url: Option<String>,
    /// Button label shown on the tender page.
    pub name: Option<String>,
    /// File name advertised for the attachment, used as an extension hint.
    pub file_name: Option<String>,
}

impl From<RawDocumentLink> for DocumentLink {
    fn from(raw: RawDocumentLink) -> Self {
        match raw {
            RawDocumentLink::Url(url) => Self {
                url: Some(url),
                ..Default::default()
            },
            RawDocumentLink::Detailed {
                url,
                name,
                file_name,
            } => Self {
                url,
                name,
                file_name,
            },
            RawDocumentLink::Other(_) => Self::default(),
        }
    }
}

impl DocumentLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Non-empty URL, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Dotted extension from the advertised file name.
    pub fn extension_hint(&self) -> Option<String> {
        self.file_name.as_deref().and_then(file_name_extension)
    }
}

/// Category code to link, iterated in ascending code order.
pub type DocumentLinks = BTreeMap<String, DocumentLink>;

/// A procurement tender and its scraped content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tender {
    pub id: i64,
    pub title: Option<String>,
    pub external_id: Option<String>,
    pub document_links: DocumentLinks,
    pub announcement_content: Option<String>,
    pub correction_notice_content: Option<String>,
    pub goods_services_content: Option<String>,
    pub zeyilname_content: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tender {
    pub fn new(id: i64, document_links: DocumentLinks) -> Self {
        Self {
            id,
            document_links,
            ..Default::default()
        }
    }

    /// Stored value of a content column.
    pub fn content(&self, column: ContentColumn) -> Option<&str> {
        match column {
            ContentColumn::Announcement => self.announcement_content.as_deref(),
            ContentColumn::CorrectionNotice => self.correction_notice_content.as_deref(),
            ContentColumn::GoodsServices => self.goods_services_content.as_deref(),
            ContentColumn::Zeyilname => self.zeyilname_content.as_deref(),
        }
    }

    /// Whether a content column already holds a non-empty value.
    pub fn has_content(&self, column: ContentColumn) -> bool {
        self.content(column).is_some_and(|c| !c.trim().is_empty())
    }

    pub fn set_content(&mut self, column: ContentColumn, value: Option<String>) {
        let slot = match column {
            ContentColumn::Announcement => &mut self.announcement_content,
            ContentColumn::CorrectionNotice => &mut self.correction_notice_content,
            ContentColumn::GoodsServices => &mut self.goods_services_content,
            ContentColumn::Zeyilname => &mut self.zeyilname_content,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_accept_strings_and_objects() {
        let links: DocumentLinks = serde_json::from_str(
            r#"{
                "tech_spec": "https://site/tender/1/8",
                "admin_spec": {"url": "https://site/download?h=1", "name": "İdari", "fileName": "idari.DOCX"},
                "empty": {"name": "nothing"}
            }"#,
        )
        .unwrap();

        assert_eq!(links["tech_spec"].url(), Some("https://site/tender/1/8"));
        assert_eq!(links["admin_spec"].extension_hint().as_deref(), Some(".docx"));
        assert_eq!(links["admin_spec"].name.as_deref(), Some("İdari"));
        assert_eq!(links["empty"].url(), None);
    }

    #[test]
    fn test_links_tolerate_null_and_numbers() {
        let links: DocumentLinks = serde_json::from_str(
            r#"{"announcement": null, "goods_list": 5, "tech_spec": "https://site/tender/1/8"}"#,
        )
        .unwrap();

        assert_eq!(links.len(), 3);
        assert_eq!(links["announcement"], DocumentLink::default());
        assert_eq!(links["goods_list"].url(), None);
        assert_eq!(links["tech_spec"].url(), Some("https://site/tender/1/8"));
    }

    #[test]
    fn test_links_iterate_sorted() {
        let links: DocumentLinks =
            serde_json::from_str(r#"{"zeyilname": "a", "announcement": "b", "goods_list": "c"}"#)
                .unwrap();
        let codes: Vec<&str> = links.keys().map(String::as_str).collect();
        assert_eq!(codes, vec!["announcement", "goods_list", "zeyilname"]);
    }

    #[test]
    fn test_content_columns() {
        let mut tender = Tender::new(1, DocumentLinks::new());
        assert!(!tender.has_content(ContentColumn::Announcement));
        tender.set_content(ContentColumn::Announcement, Some("   ".into()));
        assert!(!tender.has_content(ContentColumn::Announcement));
        tender.set_content(ContentColumn::Announcement, Some("İlan metni".into()));
        assert!(tender.has_content(ContentColumn::Announcement));
        assert_eq!(tender.content(ContentColumn::Announcement), Some("İlan metni"));
    }
}

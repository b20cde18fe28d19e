//! Tender button categories and the strategy each one maps to.
//!
//! A tender page exposes one "button" per document category. Known codes have
//! a fixed acquisition strategy; unknown codes fall back to URL-shape
//! heuristics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CONTENT_PAGE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/tender/\d+/\d+$").unwrap());
static DOWNLOAD_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(pdf|doc|docx|xls|xlsx|zip|rar)(\?|$)").unwrap());

/// How a category's link is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ContentScrape,
    ContentAndDownload,
    Download,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentScrape => "content_scrape",
            Self::ContentAndDownload => "content_and_download",
            Self::Download => "download",
        }
    }
}

/// Shape of scraped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Text,
    JsonTable,
    File,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::JsonTable => "json_table",
            Self::File => "file",
        }
    }
}

/// Tender columns that hold scraped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentColumn {
    Announcement,
    CorrectionNotice,
    GoodsServices,
    Zeyilname,
}

impl ContentColumn {
    /// Database column name.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Announcement => "announcement_content",
            Self::CorrectionNotice => "correction_notice_content",
            Self::GoodsServices => "goods_services_content",
            Self::Zeyilname => "zeyilname_content",
        }
    }
}

/// Static configuration for a known button code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTypeConfig {
    pub code: &'static str,
    pub strategy: Strategy,
    pub column: Option<ContentColumn>,
    pub format: ContentFormat,
    pub label: &'static str,
}

/// Known button codes.
pub const BUTTON_TYPES: &[ButtonTypeConfig] = &[
    ButtonTypeConfig {
        code: "announcement",
        strategy: Strategy::ContentScrape,
        column: Some(ContentColumn::Announcement),
        format: ContentFormat::Text,
        label: "İhale İlanı",
    },
    ButtonTypeConfig {
        code: "correction_notice",
        strategy: Strategy::ContentScrape,
        column: Some(ContentColumn::CorrectionNotice),
        format: ContentFormat::Text,
        label: "Düzeltme İlanı",
    },
    ButtonTypeConfig {
        code: "goods_list",
        strategy: Strategy::ContentScrape,
        column: Some(ContentColumn::GoodsServices),
        format: ContentFormat::JsonTable,
        label: "Malzeme Listesi",
    },
    ButtonTypeConfig {
        code: "admin_spec",
        strategy: Strategy::Download,
        column: None,
        format: ContentFormat::File,
        label: "İdari Şartname",
    },
    ButtonTypeConfig {
        code: "tech_spec",
        strategy: Strategy::Download,
        column: None,
        format: ContentFormat::File,
        label: "Teknik Şartname",
    },
    ButtonTypeConfig {
        code: "zeyilname",
        strategy: Strategy::ContentAndDownload,
        column: Some(ContentColumn::Zeyilname),
        format: ContentFormat::Text,
        label: "Zeyilname",
    },
];

/// Look up the static configuration for a button code.
pub fn button_type(code: &str) -> Option<&'static ButtonTypeConfig> {
    BUTTON_TYPES.iter().find(|b| b.code == code)
}

/// Resolved dispatch for one category link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Scrape the page into a tender column.
    ContentScrape {
        column: ContentColumn,
        format: ContentFormat,
        label: &'static str,
    },
    /// Scrape the page and download every attachment it links.
    ContentAndDownload {
        column: ContentColumn,
        format: ContentFormat,
        label: &'static str,
    },
    /// Download the link (resolving content-page wrappers).
    Download,
    /// Unrecognised code whose URL does not look like a file.
    Unknown,
}

impl ButtonAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContentScrape { .. } => "content_scrape",
            Self::ContentAndDownload { .. } => "content_and_download",
            Self::Download => "download",
            Self::Unknown => "unknown",
        }
    }
}

/// Resolve the acquisition strategy for a category code and its URL.
pub fn resolve_action(code: &str, url: &str) -> ButtonAction {
    match button_type(code) {
        Some(config) => match (config.strategy, config.column) {
            (Strategy::ContentScrape, Some(column)) => ButtonAction::ContentScrape {
                column,
                format: config.format,
                label: config.label,
            },
            (Strategy::ContentAndDownload, Some(column)) => ButtonAction::ContentAndDownload {
                column,
                format: config.format,
                label: config.label,
            },
            _ => ButtonAction::Download,
        },
        None if is_download_url(url) => ButtonAction::Download,
        None => ButtonAction::Unknown,
    }
}

/// `/tender/{id}/{button}` pages wrap content or attachments in HTML.
pub fn is_content_page_url(url: &str) -> bool {
    CONTENT_PAGE_URL.is_match(url)
}

/// URLs that point straight at a file.
pub fn is_download_url(url: &str) -> bool {
    url.contains("/download") || DOWNLOAD_EXTENSION.is_match(url)
}

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("admin_spec", "İdari Şartname"),
    ("tech_spec", "Teknik Şartname"),
    ("project_files", "Proje Dosyaları"),
    ("announcement", "İhale İlanı"),
    ("zeyilname", "Zeyilname"),
    ("zeyilname_tech_spec", "Teknik Şartname Zeyilnamesi"),
    ("zeyilname_admin_spec", "İdari Şartname Zeyilnamesi"),
    ("correction_notice", "Düzeltme İlanı"),
    ("contract", "Sözleşme Tasarısı"),
    ("unit_price", "Birim Fiyat Teklif Cetveli"),
    ("pursantaj", "Pursantaj Listesi"),
    ("quantity_survey", "Mahal Listesi / Metraj"),
    ("standard_forms", "Standart Formlar"),
    ("goods_services", "Mal/Hizmet Listesi"),
];

/// Human-readable name for a category code.
///
/// Numbered duplicates (`admin_spec_2`) render as "İdari Şartname 2";
/// unknown codes have underscores replaced with spaces.
pub fn display_name(code: &str) -> String {
    if let Some((_, label)) = DISPLAY_NAMES.iter().find(|(key, _)| *key == code) {
        return (*label).to_string();
    }
    // Longest key first so "zeyilname_tech_spec_2" is not read as "zeyilname" + "tech_spec_2".
    let mut keys: Vec<&(&str, &str)> = DISPLAY_NAMES.iter().collect();
    keys.sort_by_key(|(key, _)| std::cmp::Reverse(key.len()));
    for (key, label) in keys {
        if let Some(suffix) = code.strip_prefix(key).and_then(|rest| rest.strip_prefix('_')) {
            return format!("{} {}", label, suffix);
        }
    }
    code.replace('_', " ")
}

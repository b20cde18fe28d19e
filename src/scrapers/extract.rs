//! Text and table extraction from tender pages.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::utils::{element_text, fold_turkish_lower};

/// One scraped grid row, keyed by normalized header.
pub type TableRow = BTreeMap<String, String>;

/// Headers assumed for grids without `<th>` cells.
pub const DEFAULT_TABLE_HEADERS: &[&str] = &["sira", "kalem", "miktar", "birim"];

/// Body text at or below this length is treated as page chrome.
const MIN_BODY_TEXT_CHARS: usize = 100;

static CARD_BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".card-body").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Raw `<table>...</table>` block as written in the page source.
static TABLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b.*?</table>").unwrap());

/// Extract the readable text of a content page.
///
/// Tries the first `.card-body` block, then the first table, then the whole
/// body (only when it is longer than 100 characters).
pub fn scrape_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(card) = document.select(&CARD_BODY).next() {
        let text = element_text(card);
        if !text.is_empty() {
            return Some(text);
        }
    }

    if let Some(table) = document.select(&TABLE).next() {
        let text = element_text(table);
        if !text.is_empty() {
            return Some(text);
        }
    }

    let body = document.select(&BODY).next()?;
    let text = element_text(body);
    (text.chars().count() > MIN_BODY_TEXT_CHARS).then_some(text)
}

/// Normalize a header cell: `#` becomes `sira`, everything else is folded
/// to lowercase ASCII with whitespace runs turned into underscores.
pub fn normalize_header(text: &str) -> String {
    if text == "#" {
        return "sira".to_string();
    }
    fold_turkish_lower(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Whether a scraped row carries real data.
///
/// A row needs a non-empty value under some key other than `sira` and at
/// least two populated keys.
pub fn is_valid_row(row: &TableRow) -> bool {
    let has_data = row.iter().any(|(k, v)| k != "sira" && !v.is_empty());
    has_data && row.len() >= 2
}

/// Extract rows from the largest table on the page.
pub fn scrape_table(html: &str) -> Option<Vec<TableRow>> {
    let fragment = Html::parse_fragment(largest_table(html)?);
    let table = fragment.select(&TABLE).next()?;

    let mut headers: Vec<String> = table
        .select(&TH)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .map(|text| normalize_header(&text))
        .collect();
    if headers.is_empty() {
        headers = DEFAULT_TABLE_HEADERS.iter().map(|h| h.to_string()).collect();
    }

    let mut rows = Vec::new();
    for (idx, tr) in table.select(&TR).enumerate() {
        if idx == 0 && tr.select(&TH).next().is_some() {
            continue;
        }

        let mut row = TableRow::new();
        for (cell_idx, td) in tr.select(&TD).enumerate() {
            let value = element_text(td);
            if value.is_empty() {
                continue;
            }
            let key = headers
                .get(cell_idx)
                .cloned()
                .unwrap_or_else(|| format!("col_{}", cell_idx));
            row.insert(key, value);
        }

        if is_valid_row(&row) {
            rows.push(row);
        }
    }

    (!rows.is_empty()).then_some(rows)
}

/// The data grid is assumed to be the table with the most source markup.
///
/// Lengths are taken from the raw page text; the parser would insert
/// implied `<tbody>` elements and change the measure.
fn largest_table(html: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    for block in TABLE_BLOCK.find_iter(html) {
        let block = block.as_str();
        // Strictly greater keeps the first of equally sized tables.
        if best.map_or(true, |b| block.len() > b.len()) {
            best = Some(block);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_text_prefers_card_body() {
        let html = r#"<html><body>
            <nav>Menu</nav>
            <div class="card"><div class="card-body"><p>İhale  konusu:</p><p>Kırtasiye&nbsp;alımı</p></div></div>
            <table><tr><td>ignored</td></tr></table>
        </body></html>"#;
        assert_eq!(
            scrape_text(html).as_deref(),
            Some("İhale konusu: Kırtasiye alımı")
        );
    }

    #[test]
    fn test_scrape_text_falls_back_to_table() {
        let html = "<html><body><p>x</p><table><tr><td>Kalem</td><td>5 adet</td></tr></table></body></html>";
        assert_eq!(scrape_text(html).as_deref(), Some("Kalem 5 adet"));
    }

    #[test]
    fn test_scrape_text_short_body_is_none() {
        assert_eq!(scrape_text("<html><body><p>Giriş yapın</p></body></html>"), None);

        let long = "uzun metin ".repeat(20);
        let html = format!("<html><body><script>var x;</script><p>{}</p></body></html>", long);
        assert_eq!(scrape_text(&html), Some(long.trim().to_string()));
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("#"), "sira");
        assert_eq!(normalize_header("Kalem Adı"), "kalem_adi");
        assert_eq!(normalize_header("Ölçü  Birimi"), "olcu_birimi");
        assert_eq!(normalize_header("İŞ KALEMİ"), "is_kalemi");
    }

    #[test]
    fn test_scrape_table_picks_largest() {
        let html = r#"<html><body>
            <table><tr><th>A</th></tr><tr><td>1</td><td>x</td></tr></table>
            <table>
              <thead><tr><th>#</th><th>Kalem</th><th>Miktar</th><th>Birim</th></tr></thead>
              <tbody>
                <tr><td>1</td><td>Kağıt A4</td><td>100</td><td>Paket</td></tr>
                <tr><td>2</td><td>Toner</td><td>5</td><td>Adet</td></tr>
              </tbody>
            </table>
        </body></html>"#;
        let rows = scrape_table(html).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["sira"], "1");
        assert_eq!(rows[0]["kalem"], "Kağıt A4");
        assert_eq!(rows[1]["birim"], "Adet");
    }

    #[test]
    fn test_scrape_table_measures_source_markup() {
        let explicit = format!(
            "<table><tbody><tr><td>1</td><td>{}</td></tr></tbody></table>",
            "A".repeat(20)
        );
        let implied = format!("<TABLE><tr><td>2</td><td>{}</td></tr></TABLE>", "B".repeat(28));
        assert!(explicit.len() > implied.len());

        let html = format!("<html><body>{}{}</body></html>", explicit, implied);
        let rows = scrape_table(&html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sira"], "1");
        assert_eq!(rows[0]["kalem"], "A".repeat(20));

        let html = format!("<html><body>{}{}</body></html>", implied, explicit);
        assert_eq!(scrape_table(&html).unwrap()[0]["sira"], "1");
    }

    #[test]
    fn test_scrape_table_drops_sira_only_rows() {
        let html = r#"<table>
            <tr><th>#</th><th>Kalem</th></tr>
            <tr><td>1</td><td></td></tr>
            <tr><td>2</td><td>Kalem</td></tr>
        </table>"#;
        let rows = scrape_table(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sira"], "2");
    }

    #[test]
    fn test_scrape_table_default_headers_and_extra_columns() {
        let html = "<table><tr><td>1</td><td>Masa</td><td>3</td><td>Adet</td><td>Not</td></tr></table>";
        let rows = scrape_table(html).unwrap();
        assert_eq!(rows[0]["kalem"], "Masa");
        assert_eq!(rows[0]["col_4"], "Not");
    }

    #[test]
    fn test_scrape_table_none() {
        assert_eq!(scrape_table("<html><body>no tables</body></html>"), None);
        assert_eq!(scrape_table("<table><tr><td>only</td></tr></table>"), None);
    }
}

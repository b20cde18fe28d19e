//! Filename cleanup for display names and storage keys.

use regex::Regex;
use std::sync::LazyLock;

const MAX_DISPLAY_NAME_CHARS: usize = 200;

static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

/// Remove filesystem-reserved characters and tidy whitespace.
///
/// The result is capped at 200 characters.
pub fn sanitize_file_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_DISPLAY_NAME_CHARS).collect()
}

/// Transliterate Turkish letters to their ASCII base letter.
fn transliterate_turkish(c: char) -> char {
    match c {
        'ğ' => 'g',
        'Ğ' => 'G',
        'ü' => 'u',
        'Ü' => 'U',
        'ş' => 's',
        'Ş' => 'S',
        'ı' => 'i',
        'İ' => 'I',
        'ö' => 'o',
        'Ö' => 'O',
        'ç' => 'c',
        'Ç' => 'C',
        other => other,
    }
}

/// Produce an object-storage-safe name segment.
///
/// Only `[A-Za-z0-9._-]` survives; everything else becomes a dash, dash runs
/// collapse and edge dashes are trimmed. Never returns an empty string.
pub fn make_url_safe(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().map(transliterate_turkish) {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            out.push(c);
        } else {
            out.push('-');
        }
    }
    let collapsed = DASH_RUN.replace_all(&out, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase with Turkish letters folded to ASCII, for keyword matching.
pub fn fold_turkish_lower(text: &str) -> String {
    // Dotted capital I lowercases to "i̇" (with a combining dot) otherwise.
    text.replace('İ', "i")
        .to_lowercase()
        .chars()
        .map(transliterate_turkish)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_reserved() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e/f\\g|h?i*j"), "abcdefghij");
        assert_eq!(sanitize_file_name("  many   spaces\there "), "many spaces here");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "ş".repeat(300);
        assert_eq!(sanitize_file_name(&long).chars().count(), 200);
    }

    #[test]
    fn test_make_url_safe() {
        assert_eq!(make_url_safe("İdari Şartname"), "Idari-Sartname");
        assert_eq!(make_url_safe("çok  özel (dosya).pdf"), "cok-ozel-dosya-.pdf");
        assert_eq!(make_url_safe("--weird__name--"), "weird__name");
        assert_eq!(make_url_safe("???"), "file");
        assert_eq!(make_url_safe(""), "file");
    }

    #[test]
    fn test_fold_turkish_lower() {
        assert_eq!(fold_turkish_lower("İDARİ ŞARTNAME"), "idari sartname");
        assert_eq!(fold_turkish_lower("Düzeltme İlanı"), "duzeltme ilani");
        assert_eq!(fold_turkish_lower("Birim Fiyat Çizelgesi"), "birim fiyat cizelgesi");
    }
}

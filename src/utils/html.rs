//! Plain-text helpers for parsed HTML.

use scraper::{ElementRef, Html};

/// Collapse every whitespace run (including NBSP) to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element.
///
/// Script and style bodies are dropped, element boundaries act as word
/// separators and entities arrive already decoded from the parser.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style"))
        });
        if !hidden {
            out.push(' ');
            out.push_str(text);
        }
    }
    collapse_whitespace(&out)
}

/// Visible text of an HTML fragment such as an anchor body.
pub fn fragment_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element())
}

//! Document normalisation: turn an HTML fragment into a printable document.
//!
//! Clients usually post a fragment (a table, a few headings). Chromium would
//! render that in quirks mode with no print styling, so fragments are wrapped
//! in a fixed shell: doctype, UTF-8 charset, bordered table cells, a fixed
//! font, and word wrapping. Input that is already a full document is passed
//! through byte-for-byte.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest display title kept, in characters.
pub const MAX_TITLE_CHARS: usize = 150;

/// Title used when neither a title nor a report type is supplied.
pub const DEFAULT_TITLE: &str = "Report";

/// Print stylesheet applied to wrapped fragments.
pub const PRINT_STYLESHEET: &str = "\
body { font-family: Arial, Helvetica, sans-serif; font-size: 12px; color: #000; margin: 0; \
overflow-wrap: break-word; word-wrap: break-word; }
table { width: 100%; border-collapse: collapse; page-break-inside: auto; }
tr { page-break-inside: avoid; page-break-after: auto; }
th, td { border: 1px solid #000; padding: 4px 6px; vertical-align: top; word-break: break-word; }
img { max-width: 100%; }";

static RE_DOCUMENT_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<html[\s>]").unwrap());

/// The normaliser's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub html: String,
    pub safe_title: String,
}

/// True if the input already carries a document root element.
pub fn has_document_root(html: &str) -> bool {
    RE_DOCUMENT_ROOT.is_match(html)
}

/// Pick and clean the display title.
///
/// Falls back from `title` to `report_type` to [`DEFAULT_TITLE`]; strips angle
/// brackets and caps the length at [`MAX_TITLE_CHARS`].
pub fn safe_title(title: Option<&str>, report_type: Option<&str>) -> String {
    let raw = title
        .filter(|t| !t.trim().is_empty())
        .or(report_type.filter(|t| !t.trim().is_empty()))
        .unwrap_or(DEFAULT_TITLE);
    raw.chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(MAX_TITLE_CHARS)
        .collect()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Wrap `html` into a full printable document unless it already is one.
pub fn normalize(html: &str, title: Option<&str>, report_type: Option<&str>) -> NormalizedDocument {
    let safe_title = safe_title(title, report_type);
    if has_document_root(html) {
        return NormalizedDocument {
            html: html.to_string(),
            safe_title,
        };
    }

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_text(&safe_title),
        PRINT_STYLESHEET,
        html
    );
    NormalizedDocument { html, safe_title }
}

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalizes a scalar field before diffing: strips HTML tags, repairs two
/// known mis-encodings from the source feeds, collapses whitespace runs to
/// a single space, and trims. Idempotent: `normalize(normalize(s)) ==
/// normalize(s)`.
pub fn normalize_text(raw: &str) -> String {
    let stripped = HTML_TAG.replace_all(raw, "");
    let repaired = stripped.replace("\u{00AC}\u{00C6}", "®").replace("&deg;", "°");
    let collapsed = WHITESPACE_RUN.replace_all(&repaired, " ");
    collapsed.trim().to_string()
}

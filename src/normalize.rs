// src/normalize.rs
//! Sanitizer every later stage assumes ran first, plus a couple of small
//! char-safe string helpers shared by the pipeline stages.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Normalize feed prose: strip tags, decode entities, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) Strip tags first so escaped literal markup (&lt;b&gt;) survives as text.
    // Block tags separate words; inline tags do not.
    static RE_BLOCK: OnceCell<Regex> = OnceCell::new();
    let re_block = RE_BLOCK.get_or_init(|| {
        Regex::new(r"(?i)</?(?:p|div|li|ul|ol|br|hr|h[1-6]|tr|td|th|table|blockquote|section)\b[^>]*>")
            .expect("block tag regex")
    });
    let out = re_block.replace_all(s, " ");
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
    let out = re_tags.replace_all(&out, "");

    // 2) HTML entity decode
    let out = html_escape::decode_html_entities(&out);

    // 3) Collapse whitespace (Unicode-aware, covers NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// First http(s) URL in `text`, without trailing sentence punctuation.
pub fn extract_url(text: &str) -> Option<String> {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL.get_or_init(|| {
        Regex::new(r#"https?://[^\s)<>\[\]]*[^\s)<>\[\].,;:!?'"»]"#).expect("url regex")
    });
    re.find(text).map(|m| m.as_str().to_string())
}

/// Length in chars; every threshold in this crate is measured this way.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th char (or `s.len()` past the end).
pub(crate) fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// The first `n` chars of `s`.
pub fn take_chars(s: &str, n: usize) -> &str {
    &s[..byte_offset(s, n)]
}

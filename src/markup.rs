// src/markup.rs
//! Output dialects and their escaping rules.
//!
//! - `MarkdownV2`: punctuation is backslash-escaped; `*bold*`, `_italic_`,
//!   `[label](url)` links.
//! - `Html`: paired `<b>`, `<i>`, `<a href>` tags; text and attributes are
//!   entity-escaped.
//! - `Plain`: no markup, nothing escaped.
//!
//! Every piece of feed-derived text goes through [`Dialect::text`] or
//! [`Dialect::link`] before it is embedded in a message.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters MarkdownV2 treats as markup anywhere in text.
const MDV2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    MarkdownV2,
    #[default]
    Html,
    Plain,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MarkdownV2 => "markdown_v2",
            Self::Html => "html",
            Self::Plain => "plain",
        })
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "markdown_v2" | "markdownv2" | "markdown" => Ok(Self::MarkdownV2),
            "html" => Ok(Self::Html),
            "plain" | "text" | "none" => Ok(Self::Plain),
            other => Err(anyhow::anyhow!("unknown dialect `{other}`")),
        }
    }
}

impl Dialect {
    /// Render order tried when this dialect is rejected: self, the other
    /// markup dialect, then plain text.
    pub fn fallback_chain(self) -> [Dialect; 3] {
        match self {
            Self::MarkdownV2 => [Self::MarkdownV2, Self::Html, Self::Plain],
            Self::Html => [Self::Html, Self::MarkdownV2, Self::Plain],
            Self::Plain => [Self::Plain, Self::Plain, Self::Plain],
        }
    }

    /// Telegram `parse_mode` value; `None` sends plain text.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            Self::MarkdownV2 => Some("MarkdownV2"),
            Self::Html => Some("HTML"),
            Self::Plain => None,
        }
    }

    /// Escape feed-derived text for embedding.
    pub fn text(self, s: &str) -> String {
        match self {
            Self::MarkdownV2 => escape_markdown_v2(s),
            Self::Html => html_escape::encode_text(s).into_owned(),
            Self::Plain => s.to_string(),
        }
    }

    pub fn bold(self, s: &str) -> String {
        match self {
            Self::MarkdownV2 => format!("*{s}*"),
            Self::Html => format!("<b>{s}</b>"),
            Self::Plain => s.to_string(),
        }
    }

    pub fn italic(self, s: &str) -> String {
        match self {
            Self::MarkdownV2 => format!("_{s}_"),
            Self::Html => format!("<i>{s}</i>"),
            Self::Plain => s.to_string(),
        }
    }

    /// A link with raw (unescaped) label and url; both are escaped here.
    pub fn link(self, label: &str, url: &str) -> String {
        match self {
            Self::MarkdownV2 => format!(
                "[{}]({})",
                escape_markdown_v2(label),
                escape_markdown_v2_url(url)
            ),
            Self::Html => format!(
                "<a href=\"{}\">{}</a>",
                html_escape::encode_quoted_attribute(url),
                html_escape::encode_text(label)
            ),
            Self::Plain => format!("{label}: {url}"),
        }
    }
}

pub fn escape_markdown_v2(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 4);
    for ch in s.chars() {
        if MDV2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Inside `(...)` of a link only `)` and `\` are special.
pub fn escape_markdown_v2_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, ')' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// True when every paired marker of `dialect` is closed.
pub fn is_balanced(body: &str, dialect: Dialect) -> bool {
    match dialect {
        Dialect::MarkdownV2 => ['*', '_', '`']
            .iter()
            .all(|m| count_unescaped(body, *m) % 2 == 0),
        Dialect::Html => [
            (&*RE_OPEN_B, "</b>"),
            (&*RE_OPEN_I, "</i>"),
            (&*RE_OPEN_A, "</a>"),
        ]
        .iter()
        .all(|(open, close)| open.find_iter(body).count() == body.matches(close).count()),
        Dialect::Plain => true,
    }
}

/// Link targets are skipped: only `)` and `\` are escaped inside them.
fn count_unescaped(body: &str, marker: char) -> usize {
    let mut count = 0;
    let mut escaped = false;
    let mut in_url = false;
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if in_url {
            in_url = ch != ')';
        } else if ch == ']' && chars.peek() == Some(&'(') {
            chars.next();
            in_url = true;
        } else if ch == marker {
            count += 1;
        }
    }
    count
}

static RE_OPEN_B: Lazy<Regex> = Lazy::new(|| Regex::new(r"<b(?:\s[^>]*)?>").expect("open b regex"));
static RE_OPEN_I: Lazy<Regex> = Lazy::new(|| Regex::new(r"<i(?:\s[^>]*)?>").expect("open i regex"));
static RE_OPEN_A: Lazy<Regex> = Lazy::new(|| Regex::new(r"<a(?:\s[^>]*)?>").expect("open a regex"));

static RE_HTML_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\s+href="([^"]*)"\s*>(.*?)</a>"#).expect("html link regex")
});
static RE_HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("html tag regex"));

/// Strip all markup of `dialect`, leaving readable plain text.
/// Links become `label (url)`.
pub fn to_plain(body: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::MarkdownV2 => strip_markdown_v2(body),
        Dialect::Html => {
            let linked = RE_HTML_LINK.replace_all(body, "$2 ($1)");
            let untagged = RE_HTML_TAG.replace_all(&linked, "");
            html_escape::decode_html_entities(&untagged).into_owned()
        }
        Dialect::Plain => body.to_string(),
    }
}

fn strip_markdown_v2(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    let mut in_url = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            ')' if in_url => {
                out.push(')');
                in_url = false;
            }
            _ if in_url => out.push(ch),
            '*' | '_' | '~' | '`' | '[' => {}
            ']' => {
                if chars.peek() == Some(&'(') {
                    chars.next();
                    out.push_str(" (");
                    in_url = true;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

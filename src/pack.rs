// src/pack.rs
//! Message packer: lay out summarized items and source links in one dialect
//! and keep the result under the delivery surface's length ceiling.
//!
//! Oversized layouts are rebuilt with one item fewer until they fit (down to a
//! single item). If one item still does not fit, trailing lines are dropped and
//! a truncation marker appended; if not even the first line fits, the plain
//! text is cut. The returned body never exceeds the ceiling.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DigestConfig;
use crate::markup::{to_plain, Dialect};
use crate::normalize::char_len;
use crate::rank::RankedDigest;
use crate::rules::Rules;
use crate::summarize::Summarizer;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━";
const TRUNCATION_MARKER: &str = "\n\n...truncated";
const EMPTY_NOTE: &str = "No structured news items found. Check the full posts below.";

/// A distinct entry link listed under "Full Posts".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

/// Final, ready-to-send message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedMessage {
    pub body: String,
    pub dialect: Dialect,
    /// Items were dropped for length or the body was hard-truncated.
    pub truncated: bool,
    pub item_count: usize,
}

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub dialect: Dialect,
    pub length_ceiling: usize,
    pub safety_margin: usize,
    pub per_item_max_length: usize,
    pub max_items: usize,
    pub title: String,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self::from(&DigestConfig::default())
    }
}

impl From<&DigestConfig> for PackOptions {
    fn from(cfg: &DigestConfig) -> Self {
        Self {
            dialect: cfg.dialect,
            length_ceiling: cfg.length_ceiling,
            safety_margin: cfg.safety_margin,
            per_item_max_length: cfg.per_item_max_length,
            max_items: cfg.max_items_per_digest,
            title: cfg.title.clone(),
        }
    }
}

impl PackOptions {
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    fn budget(&self) -> usize {
        self.length_ceiling.saturating_sub(self.safety_margin)
    }
}

struct Layout {
    lines: Vec<String>,
    /// Index of each packed item's summary line.
    item_lines: Vec<usize>,
}

impl Layout {
    fn body(&self) -> String {
        self.lines.join("\n")
    }
}

pub struct Packer<'r> {
    summarizer: Summarizer<'r>,
    opts: PackOptions,
}

impl<'r> Packer<'r> {
    pub fn new(rules: &'r Rules, opts: PackOptions) -> Self {
        Self {
            summarizer: Summarizer::new(rules),
            opts,
        }
    }

    pub fn pack(
        &self,
        ranked: &RankedDigest,
        sources: &[SourceLink],
        generated_at: DateTime<Utc>,
    ) -> FormattedMessage {
        let dialect = self.opts.dialect;
        let budget = self.opts.budget();
        let available = ranked.len().min(self.opts.max_items);

        // summaries do not depend on n; compute once
        let summaries: Vec<String> = ranked
            .items
            .iter()
            .take(available)
            .map(|c| {
                self.summarizer
                    .summarize(&c.text, self.opts.per_item_max_length)
            })
            .collect();

        let mut n = available;
        loop {
            let layout = self.layout(ranked, &summaries[..n], sources, generated_at);
            let body = layout.body();
            let len = char_len(&body);
            if len <= budget {
                if n < available {
                    counter!("digest_pack_reductions_total").increment((available - n) as u64);
                    debug!(target: "digest", from = available, to = n, "item count reduced to fit");
                }
                return FormattedMessage {
                    body,
                    dialect,
                    truncated: n < available,
                    item_count: n,
                };
            }
            if n <= 1 {
                warn!(target: "digest", len, budget, "single item exceeds budget, hard truncating");
                counter!("digest_pack_reductions_total").increment(available.saturating_sub(n) as u64);
                return hard_truncate(layout, dialect, budget);
            }
            n -= 1;
        }
    }

    fn layout(
        &self,
        ranked: &RankedDigest,
        summaries: &[String],
        sources: &[SourceLink],
        generated_at: DateTime<Utc>,
    ) -> Layout {
        let d = self.opts.dialect;
        let mut lines = Vec::with_capacity(8 + summaries.len() * 3 + sources.len());
        let mut item_lines = Vec::with_capacity(summaries.len());

        let header = if ranked.is_unstructured() {
            format!("🤖 {} (unstructured)", self.opts.title)
        } else {
            format!("🤖 {}", self.opts.title)
        };
        lines.push(d.bold(&d.text(&header)));
        lines.push(String::new());

        if summaries.is_empty() {
            lines.push(d.italic(&d.text(EMPTY_NOTE)));
            lines.push(String::new());
        } else {
            lines.push(d.bold(&d.text("📰 Top News Items:")));
            lines.push(String::new());
            for (i, (summary, item)) in summaries.iter().zip(&ranked.items).enumerate() {
                item_lines.push(lines.len());
                lines.push(format!(
                    "{} {}",
                    d.bold(&d.text(&format!("{}.", i + 1))),
                    d.text(summary)
                ));
                if let Some(url) = &item.url {
                    lines.push(format!("   🔗 {}", d.link("Read more", url)));
                }
                lines.push(String::new());
            }
        }

        if !sources.is_empty() {
            lines.push(SEPARATOR.to_string());
            lines.push(d.bold(&d.text("📄 Full Posts:")));
            lines.push(String::new());
            for s in sources {
                lines.push(format!("• {}", d.link(&s.title, &s.url)));
            }
            lines.push(String::new());
        }

        let stamp = format!("🕐 Generated: {} UTC", generated_at.format("%Y-%m-%d %H:%M"));
        lines.push(d.italic(&d.text(&stamp)));

        Layout { lines, item_lines }
    }
}

/// Drop whole lines from the end until body + marker fits; every line is
/// self-contained markup, so what is left stays balanced.
fn hard_truncate(mut layout: Layout, dialect: Dialect, budget: usize) -> FormattedMessage {
    let marker = dialect.text(TRUNCATION_MARKER);
    let marker_len = char_len(&marker);
    let full_plain = to_plain(&layout.body(), dialect);

    while !layout.lines.is_empty() {
        let body = layout.body();
        if char_len(&body) + marker_len <= budget {
            let kept = layout.lines.len();
            let item_count = layout.item_lines.iter().filter(|&&i| i < kept).count();
            return FormattedMessage {
                body: body.trim_end().to_string() + &marker,
                dialect,
                truncated: true,
                item_count,
            };
        }
        layout.lines.pop();
    }

    FormattedMessage {
        body: cut_escaped(&full_plain, dialect, budget),
        dialect,
        truncated: true,
        item_count: 0,
    }
}

/// Re-escape `plain` char by char, stopping before the budget is exceeded, so
/// the cut never lands inside an escape sequence.
fn cut_escaped(plain: &str, dialect: Dialect, budget: usize) -> String {
    let mut out = String::new();
    let mut len = 0;
    let mut buf = [0u8; 4];
    for ch in plain.chars() {
        let escaped = dialect.text(ch.encode_utf8(&mut buf));
        let l = char_len(&escaped);
        if len + l > budget {
            break;
        }
        out.push_str(&escaped);
        len += l;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::is_balanced;
    use crate::rank::CandidateItem;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 11, 6, 30, 0).unwrap()
    }

    fn item(text: &str, url: Option<&str>) -> CandidateItem {
        CandidateItem {
            text: text.to_string(),
            url: url.map(str::to_string),
            score: 5,
        }
    }

    fn packer(opts: PackOptions) -> Packer<'static> {
        Packer::new(Rules::builtin(), opts)
    }

    #[test]
    fn margin_above_ceiling_packs_nothing_instead_of_panicking() {
        let ranked = RankedDigest::ranked(vec![item("OpenAI shipped new evals and tools.", None)]);
        let opts = PackOptions {
            length_ceiling: 4096,
            safety_margin: 5000,
            ..PackOptions::default()
        };
        let m = packer(opts).pack(&ranked, &[], at());
        assert!(m.truncated);
        assert_eq!(m.body, "");
        assert_eq!(m.item_count, 0);
    }

    #[test]
    fn html_layout_has_every_section() {
        let ranked = RankedDigest::ranked(vec![
            item("OpenAI shipped <new> evals & tools.", Some("https://openai.com/x?a=1&b=2")),
            item("Mistral raised money.", None),
        ]);
        let sources = [SourceLink {
            title: "AINews: \"Big\" day".into(),
            url: "https://news.smol.ai/issues/1".into(),
        }];
        let m = packer(PackOptions::default()).pack(&ranked, &sources, at());
        assert_eq!(m.item_count, 2);
        assert!(!m.truncated);
        assert!(m.body.starts_with("<b>🤖 AI News Daily Summary</b>\n\n<b>📰 Top News Items:</b>"));
        assert!(m.body.contains("<b>1.</b> OpenAI shipped &lt;new&gt; evals &amp; tools."));
        assert!(m.body.contains("   🔗 <a href=\"https://openai.com/x?a=1&amp;b=2\">Read more</a>"));
        assert!(m.body.contains("<b>2.</b> Mistral raised money."));
        assert!(m.body.contains(SEPARATOR));
        assert!(m.body.contains("<b>📄 Full Posts:</b>"));
        assert!(m.body.ends_with("<i>🕐 Generated: 2025-07-11 06:30 UTC</i>"));
        assert!(is_balanced(&m.body, Dialect::Html));
    }

    #[test]
    fn markdown_layout_escapes_everything() {
        let ranked = RankedDigest::ranked(vec![item(
            "GPT-4.1 (mini) is out!",
            Some("https://x.ai/a_(b)"),
        )]);
        let opts = PackOptions::default().with_dialect(Dialect::MarkdownV2);
        let m = packer(opts).pack(&ranked, &[], at());
        assert!(m.body.starts_with("*🤖 AI News Daily Summary*"));
        assert!(m.body.contains(r"*1\.* GPT\-4\.1 \(mini\) is out\!"));
        assert!(m.body.contains(r"[Read more](https://x.ai/a_(b\))"));
        assert!(m.body.contains(r"_🕐 Generated: 2025\-07\-11 06:30 UTC_"));
        // no sources, no footer section
        assert!(!m.body.contains("Full Posts"));
        assert!(is_balanced(&m.body, Dialect::MarkdownV2));
    }

    #[test]
    fn unstructured_and_empty_headers_differ() {
        let p = packer(PackOptions::default().with_dialect(Dialect::Plain));
        let u = p.pack(&RankedDigest::unstructured(item("whole content here", None)), &[], at());
        assert!(u.body.starts_with("🤖 AI News Daily Summary (unstructured)\n"));
        let e = p.pack(&RankedDigest::ranked(vec![]), &[], at());
        assert!(e.body.contains(EMPTY_NOTE));
        assert_eq!(e.item_count, 0);
        assert!(!e.truncated);
    }

    #[test]
    fn items_are_summarized_to_the_per_item_budget() {
        let long = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor \
                    incididunt ut labore et dolore magna aliqua ut enim ad minim veniam quis";
        let opts = PackOptions {
            per_item_max_length: 40,
            ..PackOptions::default().with_dialect(Dialect::Plain)
        };
        let m = packer(opts).pack(&RankedDigest::ranked(vec![item(long, None)]), &[], at());
        let line = m.body.lines().find(|l| l.starts_with("1. ")).unwrap();
        assert!(char_len(&line[3..]) <= 40, "{line}");
        assert!(line.ends_with("..."));
    }

    #[test]
    fn hard_truncation_respects_the_ceiling() {
        let huge = "word ".repeat(400);
        let ranked = RankedDigest::ranked(vec![item(huge.trim(), None)]);
        for d in [Dialect::MarkdownV2, Dialect::Html, Dialect::Plain] {
            let opts = PackOptions {
                length_ceiling: 120,
                safety_margin: 20,
                per_item_max_length: 4000,
                ..PackOptions::default().with_dialect(d)
            };
            let m = packer(opts).pack(&ranked, &[], at());
            assert!(m.truncated);
            assert!(char_len(&m.body) <= 120, "{d}: {}", char_len(&m.body));
            assert!(m.body.ends_with(&d.text(TRUNCATION_MARKER)), "{d}: {}", m.body);
            assert!(is_balanced(&m.body, d));
            assert_eq!(m.item_count, 0);
        }
    }

    #[test]
    fn tiny_ceiling_cuts_plain_text() {
        let ranked = RankedDigest::ranked(vec![item("Alpha beta gamma.", None)]);
        let opts = PackOptions {
            length_ceiling: 12,
            safety_margin: 2,
            ..PackOptions::default().with_dialect(Dialect::MarkdownV2)
        };
        let m = packer(opts).pack(&ranked, &[], at());
        assert!(char_len(&m.body) <= 12);
        assert!(m.truncated);
        assert!(m.body.starts_with("🤖 AI News"));
        assert!(is_balanced(&m.body, Dialect::MarkdownV2));
    }
}

// tests/escaping.rs
use chrono::{TimeZone, Utc};
use digest_headlines::markup::{is_balanced, to_plain, Dialect};
use digest_headlines::pack::{PackOptions, Packer, SourceLink};
use digest_headlines::{CandidateItem, RankedDigest, Rules};

const TRICKY_TEXT: &str = "C++ *isn't* dead_yet: [v2.0] (beta) costs <$5> & ships ~today! #1 | {x} = y > z `code`";
const TRICKY_TITLE: &str = "AINews: \"Q&A\" <live> [part 2] (final)_*";
const TRICKY_URL: &str = "https://example.com/wiki/A_(b)?q=1&r=\"2\"#frag";

fn message(dialect: Dialect) -> String {
    let ranked = RankedDigest::ranked(vec![CandidateItem {
        text: TRICKY_TEXT.to_string(),
        url: Some(TRICKY_URL.to_string()),
        score: 9,
    }]);
    let sources = [SourceLink {
        title: TRICKY_TITLE.to_string(),
        url: TRICKY_URL.to_string(),
    }];
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap();
    Packer::new(Rules::builtin(), PackOptions::default().with_dialect(dialect))
        .pack(&ranked, &sources, at)
        .body
}

#[test]
fn every_dialect_produces_balanced_markup() {
    for d in [Dialect::MarkdownV2, Dialect::Html, Dialect::Plain] {
        let body = message(d);
        assert!(is_balanced(&body, d), "{d}:\n{body}");
    }
}

#[test]
fn stripping_markup_recovers_the_input_strings() {
    for d in [Dialect::MarkdownV2, Dialect::Html] {
        let plain = to_plain(&message(d), d);
        assert!(plain.contains(&format!("1. {TRICKY_TEXT}")), "{d}:\n{plain}");
        assert!(plain.contains(&format!("Read more ({TRICKY_URL})")), "{d}:\n{plain}");
        assert!(plain.contains(&format!("• {TRICKY_TITLE} ({TRICKY_URL})")), "{d}:\n{plain}");
        assert!(plain.contains("Generated: 2025-01-02 03:04 UTC"), "{d}");
    }
    let plain = message(Dialect::Plain);
    assert!(plain.contains(&format!("• {TRICKY_TITLE}: {TRICKY_URL}")));
}

#[test]
fn markdown_leaves_no_special_char_unescaped_in_text() {
    let body = message(Dialect::MarkdownV2);
    let line = body.lines().find(|l| l.contains("dead")).unwrap();
    assert!(line.contains(r"C\+\+ \*isn't\* dead\_yet: \[v2\.0\] \(beta\)"), "{line}");
    assert!(line.contains(r"\#1 \| \{x\} \= y \> z \`code\`"), "{line}");
}

#[test]
fn html_escapes_text_and_link_targets() {
    let body = message(Dialect::Html);
    assert!(body.contains("&lt;$5&gt; &amp; ships"));
    assert!(body.contains("&lt;live&gt;"));
    assert!(!body.contains("href=\"https://example.com/wiki/A_(b)?q=1&r="));
}

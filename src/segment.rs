// src/segment.rs
//! Item segmenter: cut normalized digest prose into candidate items.
//!
//! Strategies run in a fixed order and their outputs are concatenated, because
//! roundups freely mix numbered lists, bullets and plain sentences:
//! 1. numbered markers (`1. `, `2. `, ...)
//! 2. bullet markers (`-`, `•`, `*`)
//! 3. sentence boundaries, only when neither 1 nor 2 produced more than one
//!    segment
//!
//! The whole text is always appended last as a single fallback candidate.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(\d{1,3})\.\s+").expect("numbered marker regex"));
static RE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)[-•*]\s+").expect("bullet marker regex"));
static RE_SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence end regex"));

/// Split `text` into unique, trimmed candidate strings in discovery order.
pub fn segment(text: &str) -> Vec<String> {
    let numbered = split_between(text, &numbered_markers(text));
    let bullets = split_between(
        text,
        &RE_BULLET
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect::<Vec<_>>(),
    );
    let split_sentences_too = numbered.len() <= 1 && bullets.len() <= 1;

    let mut raw: Vec<&str> = Vec::with_capacity(numbered.len() + bullets.len() + 1);
    raw.extend(numbered);
    raw.extend(bullets);
    if split_sentences_too {
        raw.extend(split_sentences(text));
    }
    raw.push(text);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim();
        if !s.is_empty() && seen.insert(s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Numbered markers that continue a list: `1.` starts one, `n.` must follow `n-1.`.
/// A stray "Llama 4. It ..." in prose therefore does not split.
fn numbered_markers(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut last = 0u32;
    for caps in RE_NUMBERED.captures_iter(text) {
        let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let n: u32 = num.as_str().parse().unwrap_or(0);
        if n == 1 || (last > 0 && n == last + 1) {
            spans.push((whole.start(), whole.end()));
            last = n;
        }
    }
    spans
}

/// Text between consecutive `(marker_start, content_start)` spans; text before
/// the first marker is not an item.
fn split_between<'a>(text: &'a str, spans: &[(usize, usize)]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(spans.len());
    for (i, &(_, content_start)) in spans.iter().enumerate() {
        let content_end = spans.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
        let seg = text[content_start..content_end].trim();
        if !seg.is_empty() {
            out.push(seg);
        }
    }
    out
}

/// Split after `.`, `!` or `?` when whitespace and an uppercase letter follow.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in RE_SENTENCE_END.find_iter(text) {
        let next_upper = text[m.end()..]
            .chars()
            .next()
            .is_some_and(char::is_uppercase);
        if !next_upper {
            continue;
        }
        // keep the punctuation with its sentence
        let cut = m.start() + 1;
        out.push(text[start..cut].trim());
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_items_are_captured_between_markers() {
        let t = "Today: 1. OpenAI shipped a thing. 2. Mistral raised money. 3. Groq hit a record.";
        let segs = segment(t);
        assert_eq!(
            &segs[..3],
            &[
                "OpenAI shipped a thing.",
                "Mistral raised money.",
                "Groq hit a record."
            ]
        );
        // whole text is the last candidate, sentence split is skipped
        assert_eq!(segs.last().map(String::as_str), Some(t));
        assert_eq!(segs.len(), 4);
    }

    #[test]
    fn decimals_and_hyphenated_words_are_not_markers() {
        let segs = segment("Claude 3.5 Sonnet and GPT-4o trade blows on well-known evals");
        assert_eq!(segs, vec!["Claude 3.5 Sonnet and GPT-4o trade blows on well-known evals"]);
    }

    #[test]
    fn out_of_sequence_numbers_are_prose() {
        let segs = segment("Meta shipped Llama 4. Then 1. First real item 2. Second real item");
        assert_eq!(segs[0], "First real item");
        assert_eq!(segs[1], "Second real item");
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn bullets_and_numbers_are_concatenated() {
        let t = "1. Alpha item text. - Beta bullet text • Gamma bullet text";
        let segs = segment(t);
        assert_eq!(segs[0], "Alpha item text. - Beta bullet text • Gamma bullet text");
        assert_eq!(segs[1], "Beta bullet text");
        assert_eq!(segs[2], "Gamma bullet text");
        // segs[0] doubles as the whole text minus its marker; the raw whole text follows
        assert_eq!(segs.last().map(String::as_str), Some(t));
    }

    #[test]
    fn unstructured_prose_falls_back_to_sentences() {
        let t = "Meta released Llama 4. It has 400B params! Is it good? yes, mostly.";
        let segs = segment(t);
        assert_eq!(
            segs,
            vec![
                "Meta released Llama 4.",
                "It has 400B params!",
                "Is it good? yes, mostly.",
                t,
            ]
        );
    }

    #[test]
    fn one_marker_and_one_dash_still_split_sentences() {
        let t = "1. OpenAI announced GPT-5 for developers - big news. Google launched Gemini 3 \
                 for everyone today. Anthropic released Claude 5 with better coding benchmarks.";
        let segs = segment(t);
        for s in [
            "OpenAI announced GPT-5 for developers - big news.",
            "Google launched Gemini 3 for everyone today.",
            "Anthropic released Claude 5 with better coding benchmarks.",
        ] {
            assert!(segs.iter().any(|x| x == s), "missing {s:?} in {segs:?}");
        }
        assert_eq!(segs.last().map(String::as_str), Some(t));
    }

    #[test]
    fn exact_duplicates_are_removed_in_order() {
        let t = "1. Same item here. 2. Same item here.   3. Other item here.";
        let segs = segment(t);
        assert_eq!(segs[0], "Same item here.");
        assert_eq!(segs[1], "Other item here.");
        assert_eq!(segs.len(), 3);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(segment("").is_empty());
        assert!(segment("   ").is_empty());
    }
}

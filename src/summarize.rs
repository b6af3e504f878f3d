// src/summarize.rs
//! Punchy summarizer: compress one item into a bounded-length headline.
//!
//! Tiers, first success wins:
//! 1. identity when the text already fits
//! 2. subject + verb + complement extraction (action, availability, funding)
//! 3. cut at a sentence end past half the budget
//! 4. cut at `,` `;` ` - ` past 60% of the budget, plus an ellipsis
//! 5. whole words up to the budget, plus an ellipsis
//!
//! The result never exceeds `max_len` chars, except when the first word alone
//! is longer than the budget: then that word plus the ellipsis is returned.
//! Budgets too small to hold the ellipsis get a plain char cut.

use regex::{Captures, Regex};

use crate::normalize::{char_len, take_chars};
use crate::rules::Rules;

pub const ELLIPSIS: &str = "...";
const ELLIPSIS_LEN: usize = 3;

/// Sentence cut must keep more than this share of the budget.
const SENTENCE_MIN_SHARE: f64 = 0.5;
/// Delimiter cut must keep more than this share of the budget.
const DELIMITER_MIN_SHARE: f64 = 0.6;
const DELIMITERS: [&str; 3] = [",", ";", " - "];

/// Summarize with the built-in rule table.
pub fn summarize(text: &str, max_len: usize) -> String {
    Summarizer::new(Rules::builtin()).summarize(text, max_len)
}

pub struct Summarizer<'r> {
    rules: &'r Rules,
}

impl<'r> Summarizer<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self { rules }
    }

    pub fn summarize(&self, text: &str, max_len: usize) -> String {
        if char_len(text) <= max_len {
            return text.to_string();
        }
        let text = text.trim();

        if let Some(s) = self.extract(text, max_len) {
            return s;
        }
        if let Some(s) = cut_at_sentence(text, max_len) {
            return s;
        }
        if let Some(s) = cut_at_delimiter(text, max_len) {
            return s;
        }
        cut_at_words(text, max_len)
    }

    /// First extraction pattern whose reconstruction fits the budget.
    fn extract(&self, text: &str, max_len: usize) -> Option<String> {
        let p = &self.rules.summary;
        let action = p
            .action
            .captures(text)
            .map(|c| join_triple(&c, trim_complement(text, &c)));
        let candidates = [
            action,
            rebuild(&p.availability, text),
            rebuild(&p.funding, text),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty() && char_len(s) <= max_len)
    }
}

fn rebuild(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| join_triple(&c, c.name("rest").map_or("", |m| m.as_str()).trim()))
}

fn join_triple(c: &Captures<'_>, rest: &str) -> String {
    let subject = c.name("subject").map_or("", |m| m.as_str()).trim();
    let verb = c.name("verb").map_or("", |m| m.as_str());
    format!("{subject} {verb} {rest}").trim().to_string()
}

/// The complement capture is a fixed-width window; pull it back to a word
/// boundary when it stops mid-word and drop dangling separators.
fn trim_complement<'t>(text: &'t str, c: &Captures<'t>) -> &'t str {
    let Some(m) = c.name("rest") else {
        return "";
    };
    let mut rest = m.as_str();
    let mid_word = text[m.end()..]
        .chars()
        .next()
        .is_some_and(char::is_alphanumeric)
        && rest.chars().last().is_some_and(char::is_alphanumeric);
    if mid_word {
        if let Some(ws) = rest.rfind(char::is_whitespace) {
            rest = &rest[..ws];
        }
    }
    rest.trim_end_matches(|ch: char| ch.is_whitespace() || matches!(ch, ',' | ';' | ':' | '-' | '–' | '—'))
}

/// Last `.`/`!`/`?` followed by whitespace inside the budget, past half of it.
fn cut_at_sentence(text: &str, max_len: usize) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let limit = max_len.min(chars.len());
    (0..limit)
        .rev()
        .find(|&i| {
            matches!(chars[i], '.' | '!' | '?')
                && chars.get(i + 1).is_some_and(|c| c.is_whitespace())
        })
        .filter(|&i| i as f64 > max_len as f64 * SENTENCE_MIN_SHARE)
        .map(|i| take_chars(text, i + 1).to_string())
}

/// Last delimiter inside the budget (leaving room for the ellipsis), past 60%.
fn cut_at_delimiter(text: &str, max_len: usize) -> Option<String> {
    let window = take_chars(text, max_len.saturating_sub(ELLIPSIS_LEN));
    DELIMITERS.iter().find_map(|d| {
        let pos = window.rfind(d)?;
        let pos_chars = char_len(&window[..pos]);
        if pos_chars as f64 > max_len as f64 * DELIMITER_MIN_SHARE {
            Some(format!("{}{ELLIPSIS}", window[..pos].trim_end()))
        } else {
            None
        }
    })
}

/// Whole words up to the budget, then the ellipsis. Always produces a result.
fn cut_at_words(text: &str, max_len: usize) -> String {
    if max_len <= ELLIPSIS_LEN {
        return take_chars(text, max_len).trim_end().to_string();
    }
    let budget = max_len.saturating_sub(ELLIPSIS_LEN);
    let mut out = String::new();
    let mut out_len = 0usize;
    for word in text.split_whitespace() {
        let word_len = char_len(word);
        let needed = if out.is_empty() { word_len } else { word_len + 1 };
        if out_len + needed > budget {
            if out.is_empty() {
                // single over-long leading token: the one allowed overflow
                out.push_str(word);
            }
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        out_len += needed;
    }
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_returned_unchanged() {
        for t in ["", "  padded  ", "OpenAI announced GPT-5."] {
            assert_eq!(summarize(t, 40), t);
        }
    }

    #[test]
    fn action_pattern_keeps_who_did_what() {
        let t = "OpenAI announced GPT-5 today with major reasoning improvements across benchmarks, \
                 marking a significant leap, and it is already available via API.";
        let s = summarize(t, 80);
        assert!(s.starts_with("OpenAI announced GPT-5"), "{s}");
        assert!(char_len(&s) <= 80);
        // the complement is pulled back to a whole word
        assert!(s.ends_with("across"), "{s}");
    }

    #[test]
    fn availability_pattern() {
        let t = "After months of waitlists and a lot of speculation from the community, \
                 Sora is now available to everyone in the US and Canada starting this week";
        let s = summarize(t, 60);
        assert_eq!(s, "Sora is now available");
    }

    #[test]
    fn funding_pattern_extracts_amount() {
        let t = "Mistral AI raises $600M in a round led by General Catalyst, valuing the \
                 Paris-based lab behind several open models at six billion euros";
        assert_eq!(summarize(t, 70), "Mistral AI raises $600M");
    }

    #[test]
    fn sentence_fallback_cuts_after_half() {
        let t = "the eval suite got a refresh this week with harder math. \
                 more tasks are planned for the next release of the harness";
        let s = summarize(t, 70);
        assert_eq!(s, "the eval suite got a refresh this week with harder math.");
    }

    #[test]
    fn delimiter_fallback_appends_ellipsis() {
        let t = "a quiet week overall on the leaderboards with small moves everywhere, \
                 though one lab hinted at a bigger release soon";
        let s = summarize(t, 80);
        assert_eq!(
            s,
            "a quiet week overall on the leaderboards with small moves everywhere..."
        );
        assert!(char_len(&s) <= 80);
    }

    #[test]
    fn word_fallback_respects_budget() {
        let t = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor";
        let s = summarize(t, 30);
        assert_eq!(s, "lorem ipsum dolor sit amet...");
        assert!(char_len(&s) <= 30);
    }

    #[test]
    fn single_overlong_token_is_the_only_overflow() {
        let token = "x".repeat(50);
        let s = summarize(&format!("{token} tail words"), 20);
        assert_eq!(s, format!("{token}..."));
        assert!(char_len(&s) > 20);
    }

    #[test]
    fn tiny_budgets_cut_without_an_ellipsis() {
        assert_eq!(summarize("ab cd ef", 3), "ab");
        for max in 0..=3 {
            assert!(char_len(&summarize("ab cd ef", max)) <= max, "max={max}");
        }
    }

    #[test]
    fn length_bound_holds_across_budgets() {
        let t = "Researchers at a university lab, working with two startups; published \
                 a dataset - huge, messy, multilingual - and an eval harness for agents";
        for max in 14..char_len(t) {
            let s = summarize(t, max);
            assert!(char_len(&s) <= max, "max={max} got {} chars: {s}", char_len(&s));
        }
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let t = "Žluťoučký kůň úpěl ďábelské ódy, a pak ještě jednou a znovu a znovu bez konce";
        let s = summarize(t, 25);
        assert!(char_len(&s) <= 25);
        assert!(s.ends_with(ELLIPSIS));
    }
}

// src/rank.rs
//! Relevance scorer and deduplicator.
//!
//! Scoring is additive over keyword/shape signals from the rule table. Low
//! scorers and short unterminated fragments are dropped, near-duplicates
//! collapse onto the best-ranked copy, and the survivors are ordered by score
//! with segmentation order breaking ties.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::DigestConfig;
use crate::normalize::{char_len, extract_url, take_chars};
use crate::rules::Rules;

static RE_LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-•*]|\d{1,3}\.)\s*").expect("leading marker regex"));

/// One provisional news mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateItem {
    pub text: String,
    pub url: Option<String>,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DigestKind {
    /// Items came out of segmentation + scoring.
    Ranked,
    /// Nothing qualified; the whole content stands in as one item.
    Unstructured,
}

/// Items by descending score, ties in discovery order, unique dedup keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedDigest {
    pub items: Vec<CandidateItem>,
    pub kind: DigestKind,
}

impl RankedDigest {
    pub fn ranked(items: Vec<CandidateItem>) -> Self {
        Self {
            items,
            kind: DigestKind::Ranked,
        }
    }

    pub fn unstructured(item: CandidateItem) -> Self {
        Self {
            items: vec![item],
            kind: DigestKind::Unstructured,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_unstructured(&self) -> bool {
        self.kind == DigestKind::Unstructured
    }
}

/// Score plus the reasons behind it, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scored {
    pub score: i32,
    pub reasons: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    pub min_candidate_length: usize,
    pub inclusion_score_threshold: i32,
    pub fragment_min_length: usize,
    pub dedup_prefix_length: usize,
    pub max_items: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self::from(&DigestConfig::default())
    }
}

impl From<&DigestConfig> for RankOptions {
    fn from(cfg: &DigestConfig) -> Self {
        Self {
            min_candidate_length: cfg.min_candidate_length,
            inclusion_score_threshold: cfg.inclusion_score_threshold,
            fragment_min_length: cfg.fragment_min_length,
            dedup_prefix_length: cfg.dedup_prefix_length,
            max_items: cfg.max_items_per_digest,
        }
    }
}

/// Case-folded fixed-length prefix used to spot near-duplicates.
pub fn dedup_key(text: &str, prefix_len: usize) -> String {
    take_chars(text, prefix_len).to_lowercase()
}

/// Short anonymized id so diagnostics never carry raw feed text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn is_terminated(text: &str) -> bool {
    text.ends_with(['.', '!', '?'])
}

pub struct Ranker<'r> {
    rules: &'r Rules,
    opts: RankOptions,
}

impl<'r> Ranker<'r> {
    pub fn new(rules: &'r Rules, opts: RankOptions) -> Self {
        Self { rules, opts }
    }

    /// Pure function of `text`.
    pub fn score(&self, text: &str) -> i32 {
        self.score_with_reasons(text).score
    }

    pub fn score_with_reasons(&self, text: &str) -> Scored {
        let w = self.rules.weights();
        let sig = self.rules.signals(text);
        let mut out = Scored::default();
        for (hit, points, reason) in [
            (sig.action, w.action, "action"),
            (sig.company, w.company, "company"),
            (sig.technical, w.technical, "technical"),
            (sig.capitalized, w.capitalized, "capitalized"),
        ] {
            if hit {
                out.score += points;
                out.reasons.push(reason);
            }
        }
        out
    }

    /// Turn raw segments into scored candidates, dropping everything that
    /// fails the length, threshold or fragment checks. Order is preserved.
    pub fn candidates(&self, segments: &[String]) -> Vec<CandidateItem> {
        let mut out = Vec::with_capacity(segments.len());
        for seg in segments {
            let text = RE_LEADING_MARKER.replace(seg.trim(), "").trim().to_string();
            let len = char_len(&text);
            if len < self.opts.min_candidate_length {
                continue;
            }

            let scored = self.score_with_reasons(&text);
            let id = anon_hash(&text);
            if scored.score < self.opts.inclusion_score_threshold {
                debug!(target: "digest", %id, score = scored.score, reasons = ?scored.reasons, "below threshold");
                continue;
            }
            if !is_terminated(&text) && len < self.opts.fragment_min_length {
                debug!(target: "digest", %id, score = scored.score, len, "fragment rejected");
                continue;
            }
            debug!(target: "digest", %id, score = scored.score, reasons = ?scored.reasons, "candidate kept");

            out.push(CandidateItem {
                url: extract_url(&text),
                text,
                score: scored.score,
            });
        }
        out
    }

    /// Segments in, ranked digest out.
    pub fn score_and_rank(&self, segments: &[String]) -> RankedDigest {
        self.rank(self.candidates(segments))
    }

    /// Stable sort by score, drop collisions, keep the top `max_items`.
    /// Also used to merge candidates gathered from several entries.
    ///
    /// A candidate that contains another candidate (the whole-text fallback, a
    /// numbered item that swallowed bullets) is only considered after every
    /// candidate it could hold, so it survives only when none of them did.
    pub fn rank(&self, candidates: Vec<CandidateItem>) -> RankedDigest {
        let holds: Vec<bool> = candidates
            .iter()
            .map(|c| {
                candidates
                    .iter()
                    .any(|o| o.text.len() < c.text.len() && c.text.contains(o.text.as_str()))
            })
            .collect();
        let mut ordered: Vec<(bool, CandidateItem)> = holds.into_iter().zip(candidates).collect();
        ordered.sort_by(|(ha, a), (hb, b)| ha.cmp(hb).then(b.score.cmp(&a.score)));

        let mut kept: Vec<CandidateItem> = Vec::with_capacity(ordered.len());
        let mut keys: Vec<String> = Vec::with_capacity(ordered.len());
        for (_, c) in ordered {
            let key = dedup_key(&c.text, self.opts.dedup_prefix_length);
            let collides = kept
                .iter()
                .zip(&keys)
                .any(|(k, kk)| *kk == key || k.text.contains(&c.text) || c.text.contains(&k.text));
            if collides {
                debug!(target: "digest", id = %anon_hash(&c.text), "duplicate dropped");
                continue;
            }
            keys.push(key);
            kept.push(c);
        }
        kept.sort_by(|a, b| b.score.cmp(&a.score));
        kept.truncate(self.opts.max_items);
        RankedDigest::ranked(kept)
    }
}

// src/pipeline.rs
//! Entry point: source entries in, re-renderable digest out.
//!
//! normalize -> segment -> score/filter per entry, merge across entries with
//! the same rank/dedup pass, then pack in whatever dialect the caller asks for.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::DigestConfig;
use crate::ingest::types::SourceEntry;
use crate::markup::{is_balanced, Dialect};
use crate::normalize::{extract_url, normalize_text};
use crate::pack::{FormattedMessage, PackOptions, Packer, SourceLink};
use crate::rank::{CandidateItem, RankOptions, RankedDigest, Ranker};
use crate::rules::Rules;
use crate::segment::segment;

const NO_NEWS: &str = "⚠️ No recent AI news found.";

/// One-time metrics registration.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_candidates_total",
            "Candidates that passed length, threshold and fragment checks."
        );
        describe_counter!(
            "digest_items_dropped_total",
            "Candidates removed by dedup or the item cap."
        );
        describe_counter!(
            "digest_pack_reductions_total",
            "Items dropped by the packer to fit the length ceiling."
        );
        describe_counter!(
            "digest_delivery_attempts_total",
            "Render+send attempts, including dialect fallbacks."
        );
    });
}

/// Extraction result; rendering it again never re-runs extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    pub ranked: RankedDigest,
    pub sources: Vec<SourceLink>,
    pub generated_at: DateTime<Utc>,
}

impl Digest {
    pub fn render(&self, dialect: Dialect, cfg: &DigestConfig, rules: &Rules) -> FormattedMessage {
        let opts = PackOptions::from(cfg).with_dialect(dialect);
        Packer::new(rules, opts).pack(&self.ranked, &self.sources, self.generated_at)
    }

    /// First render in `cfg.dialect`'s fallback chain whose markup is
    /// balanced. Plain text always is, so this always yields a message.
    pub fn render_with_fallback(&self, cfg: &DigestConfig, rules: &Rules) -> FormattedMessage {
        for dialect in cfg.dialect.fallback_chain() {
            let msg = self.render(dialect, cfg, rules);
            if is_balanced(&msg.body, dialect) {
                return msg;
            }
            warn!(target: "digest", %dialect, "unbalanced markup, trying next dialect");
        }
        self.render(Dialect::Plain, cfg, rules)
    }
}

/// Candidates from one entry, already ranked and capped for that entry.
pub fn extract_items(entry: &SourceEntry, ranker: &Ranker<'_>) -> Vec<CandidateItem> {
    let text = normalize_text(&entry.raw_content);
    if text.is_empty() {
        return Vec::new();
    }
    let segments = segment(&text);
    let candidates = ranker.candidates(&segments);
    counter!("digest_candidates_total").increment(candidates.len() as u64);
    ranker.rank(candidates).items
}

/// Digest the first `cfg.max_entries` entries. `None` when there are none.
pub fn build_digest(
    entries: &[SourceEntry],
    cfg: &DigestConfig,
    rules: &Rules,
    now: DateTime<Utc>,
) -> Option<Digest> {
    ensure_metrics_described();
    let first = entries.first()?;
    let used = &entries[..entries.len().min(cfg.max_entries)];
    let ranker = Ranker::new(rules, RankOptions::from(cfg));

    let mut merged = Vec::new();
    for entry in used {
        merged.extend(extract_items(entry, &ranker));
    }
    let pooled = merged.len();
    let mut ranked = ranker.rank(merged);
    counter!("digest_items_dropped_total").increment((pooled - ranked.len()) as u64);

    if ranked.is_empty() {
        ranked = RankedDigest::unstructured(fallback_item(first));
        info!(target: "digest", "no qualifying items, using whole content");
    }

    let mut sources: Vec<SourceLink> = Vec::with_capacity(used.len());
    for e in used {
        if !e.link.is_empty() && !sources.iter().any(|s| s.url == e.link) {
            sources.push(SourceLink {
                title: e.title.clone(),
                url: e.link.clone(),
            });
        }
    }

    info!(
        target: "digest",
        entries = used.len(),
        items = ranked.len(),
        unstructured = ranked.is_unstructured(),
        "digest built"
    );
    Some(Digest {
        ranked,
        sources,
        generated_at: now,
    })
}

fn fallback_item(entry: &SourceEntry) -> CandidateItem {
    let content = normalize_text(&entry.raw_content);
    let text = if content.is_empty() {
        entry.title.clone()
    } else {
        content
    };
    let url = extract_url(&text).or_else(|| Some(entry.link.clone()).filter(|l| !l.is_empty()));
    CandidateItem {
        text,
        url,
        score: 0,
    }
}

/// Short notice for a run that found nothing to digest.
pub fn no_news_message(dialect: Dialect) -> FormattedMessage {
    FormattedMessage {
        body: dialect.text(NO_NEWS),
        dialect,
        truncated: false,
        item_count: 0,
    }
}

/// Build and render in one go, with the dialect fallback applied.
pub fn summarize_entries(
    entries: &[SourceEntry],
    cfg: &DigestConfig,
    rules: &Rules,
    now: DateTime<Utc>,
) -> FormattedMessage {
    match build_digest(entries, cfg, rules, now) {
        Some(d) => d.render_with_fallback(cfg, rules),
        None => no_news_message(cfg.dialect),
    }
}

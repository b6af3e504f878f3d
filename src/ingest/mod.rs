// src/ingest/mod.rs
pub mod rss;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tracing::info;

use crate::ingest::types::{FeedProvider, SourceEntry};

/// Entries published within the last `hours`, plus undated ones. When nothing
/// qualifies the newest entry (the first one) stands in.
pub fn select_recent(entries: Vec<SourceEntry>, now: DateTime<Utc>, hours: i64) -> Vec<SourceEntry> {
    let cutoff = now - Duration::hours(hours);
    let mut entries = entries;
    let first = entries.first().cloned();
    entries.retain(|e| e.published_at.map_or(true, |p| p > cutoff));

    match first {
        Some(first) if entries.is_empty() => {
            info!(target: "digest", "no recent entries, using the latest one");
            vec![first]
        }
        _ => entries,
    }
}

/// Fetch once from `provider` and keep the recent entries.
pub async fn fetch_recent(
    provider: &dyn FeedProvider,
    now: DateTime<Utc>,
    hours: i64,
) -> anyhow::Result<Vec<SourceEntry>> {
    let entries = match provider.fetch_entries().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "digest", error = ?e, provider = provider.name(), "provider error");
            counter!("digest_feed_errors_total").increment(1);
            return Err(e);
        }
    };
    let total = entries.len();
    let recent = select_recent(entries, now, hours);
    info!(target: "digest", total, recent = recent.len(), provider = provider.name(), "feed fetched");
    Ok(recent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(title: &str, published_at: Option<DateTime<Utc>>) -> SourceEntry {
        SourceEntry::from_parts(Some(title.into()), None, None, published_at)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 11, 12, 0, 0).unwrap()
    }

    #[test]
    fn keeps_recent_and_undated() {
        let n = now();
        let got = select_recent(
            vec![
                entry("fresh", Some(n - Duration::hours(2))),
                entry("undated", None),
                entry("stale", Some(n - Duration::hours(30))),
                entry("edge", Some(n - Duration::hours(25))),
            ],
            n,
            25,
        );
        let titles: Vec<&str> = got.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "undated"]);
    }

    #[test]
    fn falls_back_to_newest_when_nothing_is_recent() {
        let n = now();
        let got = select_recent(
            vec![
                entry("newest", Some(n - Duration::days(3))),
                entry("older", Some(n - Duration::days(4))),
            ],
            n,
            25,
        );
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "newest");
        assert!(select_recent(vec![], n, 25).is_empty());
    }

    #[test]
    fn entry_defaults_resolve_at_the_boundary() {
        let e = SourceEntry::from_parts(Some("   ".into()), None, None, None);
        assert_eq!(e.title, types::DEFAULT_ENTRY_TITLE);
        assert_eq!(e.link, "");
        assert_eq!(e.raw_content, "");
    }
}

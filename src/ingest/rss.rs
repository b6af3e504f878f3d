// src/ingest/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{FeedProvider, SourceEntry};

pub const DEFAULT_FEED_URL: &str = "https://news.smol.ai/rss.xml";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// RFC 2822, RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD`.
/// Anything else is `None`, never an error.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(dt) = OffsetDateTime::parse(s, &Rfc2822).ok().and_then(from_offset) {
        return Some(dt);
    }
    // chrono also takes obsolete zone names (GMT, EST, ...)
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OffsetDateTime::parse(s, &Rfc3339).ok().and_then(from_offset) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub struct RssProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("digest-headlines/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build feed http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    pub fn parse_entries(s: &str) -> Result<Vec<SourceEntry>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let published_at = it.pub_date.as_deref().and_then(parse_feed_date);
            if it.pub_date.is_some() && published_at.is_none() {
                tracing::debug!(target: "digest", raw = ?it.pub_date, "unparseable pubDate");
            }
            let content = it
                .description
                .filter(|d| !d.trim().is_empty())
                .or(it.content_encoded);
            out.push(SourceEntry::from_parts(it.title, it.link, content, published_at));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("digest_feed_parse_ms").record(ms);
        counter!("digest_feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssProvider {
    async fn fetch_entries(&self) -> Result<Vec<SourceEntry>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_entries(s),
            Mode::Http { url, client } => {
                let resp = match client.get(url.as_str()).send().await {
                    Ok(resp) => resp,
                    Err(e) => {
                        tracing::warn!(target: "digest", error = ?e, %url, "feed http error");
                        counter!("digest_feed_errors_total").increment(1);
                        return Err(e).context("feed http get()");
                    }
                };
                let body = resp
                    .error_for_status()
                    .context("feed http status")?
                    .text()
                    .await
                    .context("feed http .text()")?;
                Self::parse_entries(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

// XML only knows five named entities; feeds routinely use HTML ones
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&hellip;", "&#8230;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_in_every_supported_shape() {
        let want = Utc.with_ymd_and_hms(2025, 7, 11, 5, 44, 31).unwrap();
        assert_eq!(parse_feed_date("Fri, 11 Jul 2025 05:44:31 +0000"), Some(want));
        assert_eq!(parse_feed_date("Fri, 11 Jul 2025 05:44:31 GMT"), Some(want));
        assert_eq!(parse_feed_date("Fri, 11 Jul 2025 07:44:31 +0200"), Some(want));
        assert_eq!(parse_feed_date("2025-07-11T05:44:31Z"), Some(want));
        assert_eq!(parse_feed_date("2025-07-11 05:44:31"), Some(want));
        assert_eq!(
            parse_feed_date("2025-07-11"),
            Some(Utc.with_ymd_and_hms(2025, 7, 11, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn junk_dates_are_none() {
        assert_eq!(parse_feed_date(""), None);
        assert_eq!(parse_feed_date("yesterday-ish"), None);
        assert_eq!(parse_feed_date("2025-13-45"), None);
    }

    #[test]
    fn html_entities_survive_xml_parsing() {
        let xml = "<rss><channel><item><title>A&nbsp;B &ldquo;C&rdquo;</title></item></channel></rss>";
        let entries = RssProvider::parse_entries(xml).unwrap();
        assert_eq!(entries[0].title, "A\u{a0}B \u{201C}C\u{201D}");
    }
}

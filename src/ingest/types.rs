// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

pub const DEFAULT_ENTRY_TITLE: &str = "AI News Update";

/// One feed entry; defaults are resolved here, once, so the pipeline never
/// has to guess.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub title: String,
    pub link: String,
    pub raw_content: String, // markup as delivered by the feed
    pub published_at: Option<DateTime<Utc>>,
}

impl SourceEntry {
    pub fn from_parts(
        title: Option<String>,
        link: Option<String>,
        raw_content: Option<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_ENTRY_TITLE.to_string());
        Self {
            title,
            link: link.map(|l| l.trim().to_string()).unwrap_or_default(),
            raw_content: raw_content.unwrap_or_default(),
            published_at,
        }
    }
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    /// Entries newest first, as the feed lists them.
    async fn fetch_entries(&self) -> Result<Vec<SourceEntry>>;
    fn name(&self) -> &'static str;
}

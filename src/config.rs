// src/config.rs
//! Digest configuration: TOML file, then env overrides, then validation.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::markup::Dialect;

// --- env defaults & names ---
pub const DEFAULT_DIGEST_CONFIG_PATH: &str = "config/digest.toml";

pub const ENV_DIGEST_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const ENV_DIGEST_MAX_ITEMS: &str = "DIGEST_MAX_ITEMS";
pub const ENV_DIGEST_ITEM_MAX_LENGTH: &str = "DIGEST_ITEM_MAX_LENGTH";
pub const ENV_DIGEST_SCORE_THRESHOLD: &str = "DIGEST_SCORE_THRESHOLD";
pub const ENV_DIGEST_DIALECT: &str = "DIGEST_DIALECT";

/// Smallest per-item budget that still leaves room for a word plus ellipsis.
const MIN_ITEM_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub max_items_per_digest: usize,
    pub per_item_max_length: usize,
    pub inclusion_score_threshold: i32,
    pub dedup_prefix_length: usize,
    pub dialect: Dialect,
    pub min_candidate_length: usize,
    pub fragment_min_length: usize,
    pub length_ceiling: usize,
    pub safety_margin: usize,
    pub max_entries: usize,
    pub recency_hours: i64,
    pub title: String,
    pub rules_path: Option<PathBuf>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_items_per_digest: 5,
            per_item_max_length: 120,
            inclusion_score_threshold: 3,
            dedup_prefix_length: 50,
            dialect: Dialect::Html,
            min_candidate_length: 30,
            fragment_min_length: 60,
            length_ceiling: 4096,
            safety_margin: 200,
            max_entries: 3,
            recency_hours: 25,
            title: "AI News Daily Summary".to_string(),
            rules_path: None,
        }
    }
}

// lenient env parsing: bad values are ignored, not fatal
fn parse_usize_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_i32_env(raw: Option<String>) -> Option<i32> {
    raw.and_then(|s| s.trim().parse::<i32>().ok())
}

fn parse_dialect_env(raw: Option<String>) -> Option<Dialect> {
    raw.and_then(|s| s.parse::<Dialect>().ok())
}

impl DigestConfig {
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: DigestConfig = toml::from_str(toml_str).context("parse digest config")?;
        Ok(cfg.validated())
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read digest config at {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("load digest config at {}", path.display()))
    }

    /// Uses DIGEST_CONFIG_PATH or `config/digest.toml`; a missing default file
    /// means built-in defaults, a missing explicit file is an error.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(ENV_DIGEST_CONFIG_PATH).ok().map(PathBuf::from);
        let cfg = match explicit {
            Some(path) => Self::from_path(&path)?,
            None => {
                let path = Path::new(DEFAULT_DIGEST_CONFIG_PATH);
                if path.exists() {
                    Self::from_path(path)?
                } else {
                    info!(target: "digest", "no {} found, using defaults", DEFAULT_DIGEST_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        Ok(cfg.with_env_overrides().validated())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = parse_usize_env(std::env::var(ENV_DIGEST_MAX_ITEMS).ok()) {
            self.max_items_per_digest = n;
        }
        if let Some(n) = parse_usize_env(std::env::var(ENV_DIGEST_ITEM_MAX_LENGTH).ok()) {
            self.per_item_max_length = n;
        }
        if let Some(t) = parse_i32_env(std::env::var(ENV_DIGEST_SCORE_THRESHOLD).ok()) {
            self.inclusion_score_threshold = t;
        }
        if let Ok(raw) = std::env::var(ENV_DIGEST_DIALECT) {
            match parse_dialect_env(Some(raw.clone())) {
                Some(d) => self.dialect = d,
                None => warn!(target: "digest", value = %raw, "ignoring unknown DIGEST_DIALECT"),
            }
        }
        self
    }

    /// Clamp every field into a range the pipeline can work with.
    pub fn validated(mut self) -> Self {
        self.max_items_per_digest = self.max_items_per_digest.max(1);
        self.max_entries = self.max_entries.max(1);
        self.per_item_max_length = self.per_item_max_length.max(MIN_ITEM_LENGTH);
        self.dedup_prefix_length = self.dedup_prefix_length.max(1);
        self.inclusion_score_threshold = self.inclusion_score_threshold.max(0);
        self.recency_hours = self.recency_hours.max(1);
        self.length_ceiling = self.length_ceiling.max(1);
        if self.safety_margin >= self.length_ceiling {
            self.safety_margin = self.length_ceiling / 2;
        }
        if self.title.trim().is_empty() {
            self.title = Self::default().title;
        }
        self
    }
}

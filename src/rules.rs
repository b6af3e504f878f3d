// src/rules.rs
//! Versioned rule table: the scoring vocabulary, scoring weights and the verb
//! lists behind headline extraction.
//!
//! The table is data (`config/rules.toml`). A copy is embedded at compile time
//! so the pipeline works without any files on disk; `DIGEST_RULES_PATH` or
//! `DigestConfig::rules_path` swaps in a tuned table.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_RULES_PATH: &str = "DIGEST_RULES_PATH";

const BUILTIN_RULES_TOML: &str = include_str!("../config/rules.toml");

static BUILTIN: Lazy<Rules> = Lazy::new(|| {
    Rules::from_toml_str(BUILTIN_RULES_TOML).expect("embedded config/rules.toml must compile")
});

/* ----------------------------
Rule table schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct RuleTable {
    pub version: u32,
    #[serde(default)]
    pub weights: ScoreWeights,
    pub action_keywords: Vec<String>,
    pub companies: Vec<String>,
    #[serde(default)]
    pub company_patterns: Vec<String>,
    pub technical_terms: Vec<String>,
    pub summary: SummaryRules,
}

/// Points added per signal. The shipped table uses 2/3/2/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScoreWeights {
    pub action: i32,
    pub company: i32,
    pub technical: i32,
    pub capitalized: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            action: 2,
            company: 3,
            technical: 2,
            capitalized: 1,
        }
    }
}

fn default_complement_min() -> usize {
    10
}
fn default_complement_max() -> usize {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRules {
    pub action_verbs: Vec<String>,
    pub availability_links: Vec<String>,
    pub availability_states: Vec<String>,
    pub funding_verbs: Vec<String>,
    #[serde(default = "default_complement_min")]
    pub complement_min: usize,
    #[serde(default = "default_complement_max")]
    pub complement_max: usize,
}

/* ----------------------------
Compiled rules
---------------------------- */

/// Which scoring signals a text carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub action: bool,
    pub company: bool,
    pub technical: bool,
    pub capitalized: bool,
}

#[derive(Debug)]
pub(crate) struct SummaryPatterns {
    pub(crate) action: Regex,
    pub(crate) availability: Regex,
    pub(crate) funding: Regex,
}

/// The rule table with every vocabulary compiled into a regex.
#[derive(Debug)]
pub struct Rules {
    pub table: RuleTable,
    action_re: Regex,
    company_re: Regex,
    technical_re: Regex,
    pub(crate) summary: SummaryPatterns,
}

// Leading capital, then up to six more words before the verb.
const SUBJECT: &str = r"(?P<subject>[A-Z][\w&.'’\-]*(?:\s+[\w&.'’\-]+){0,6}?)";

impl Rules {
    /// Shared instance compiled from the embedded table.
    pub fn builtin() -> &'static Rules {
        &BUILTIN
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let table: RuleTable = toml::from_str(toml_str).context("parsing rule table")?;
        Self::compile(table)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading rule table from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("loading rule table {}", path.display()))
    }

    /// Resolve the table to use: explicit path, then `$DIGEST_RULES_PATH`, then built-in.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(ENV_RULES_PATH).ok().map(PathBuf::from));
        match resolved {
            Some(p) => Self::from_path(&p),
            None => Self::from_toml_str(BUILTIN_RULES_TOML),
        }
    }

    pub fn compile(table: RuleTable) -> Result<Self> {
        if table.action_keywords.is_empty() || table.companies.is_empty() {
            return Err(anyhow!(
                "rule table v{}: action_keywords and companies must not be empty",
                table.version
            ));
        }
        let s = &table.summary;
        if s.complement_min == 0 || s.complement_min > s.complement_max {
            return Err(anyhow!(
                "rule table v{}: complement_min must be in 1..=complement_max",
                table.version
            ));
        }

        let action_re = word_set(&table.action_keywords, &[])
            .map_err(|e| anyhow!("action_keywords regex error: {e}"))?;
        let company_re = word_set(&table.companies, &table.company_patterns)
            .map_err(|e| anyhow!("companies regex error: {e}"))?;
        let technical_re = word_set(&table.technical_terms, &[])
            .map_err(|e| anyhow!("technical_terms regex error: {e}"))?;

        let action = Regex::new(&format!(
            r"{SUBJECT}\s+(?P<verb>(?i:{}))\s+(?P<rest>.{{{},{}}})",
            alternation(&s.action_verbs),
            s.complement_min,
            s.complement_max
        ))
        .map_err(|e| anyhow!("summary action pattern error: {e}"))?;
        let availability = Regex::new(&format!(
            r"{SUBJECT}\s+(?P<verb>(?i:{}))\s+(?P<rest>(?i:{}))\b",
            alternation(&s.availability_links),
            alternation(&s.availability_states)
        ))
        .map_err(|e| anyhow!("summary availability pattern error: {e}"))?;
        let funding = Regex::new(&format!(
            r"{SUBJECT}\s+(?P<verb>(?i:{}))\s+(?P<rest>\$[\d.,]+\s*[MBK]?(?:\s*(?i:million|billion))?)",
            alternation(&s.funding_verbs)
        ))
        .map_err(|e| anyhow!("summary funding pattern error: {e}"))?;

        Ok(Self {
            table,
            action_re,
            company_re,
            technical_re,
            summary: SummaryPatterns {
                action,
                availability,
                funding,
            },
        })
    }

    pub fn weights(&self) -> ScoreWeights {
        self.table.weights
    }

    pub fn signals(&self, text: &str) -> Signals {
        Signals {
            action: self.action_re.is_match(text),
            company: self.company_re.is_match(text),
            technical: self.technical_re.is_match(text),
            capitalized: text.chars().next().is_some_and(char::is_uppercase),
        }
    }
}

/// Escaped, longest-first alternation so "is now" wins over "is".
fn alternation(words: &[String]) -> String {
    let mut sorted: Vec<&str> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    sorted.dedup();
    sorted
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}

/// Case-insensitive whole-word matcher over literals plus raw regex fragments.
fn word_set(literals: &[String], patterns: &[String]) -> Result<Regex, regex::Error> {
    let mut alts = alternation(literals);
    for p in patterns {
        if !alts.is_empty() {
            alts.push('|');
        }
        alts.push_str(p);
    }
    if alts.is_empty() {
        // Matches nothing.
        return Regex::new(r"[^\s\S]");
    }
    Regex::new(&format!(r"(?i)\b(?:{alts})\b"))
}

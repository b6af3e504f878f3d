// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod markup;
pub mod normalize;
pub mod pack;
pub mod rank;
pub mod rules;
pub mod segment;
pub mod summarize;

// Pipeline entry point (normalize -> segment -> rank -> summarize -> pack)
pub mod pipeline;

// Collaborators: feed ingest and delivery
pub mod ingest;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::DigestConfig;
pub use crate::ingest::types::SourceEntry;
pub use crate::markup::Dialect;
pub use crate::pack::{FormattedMessage, SourceLink};
pub use crate::pipeline::{build_digest, summarize_entries, Digest};
pub use crate::rank::{CandidateItem, RankedDigest};
pub use crate::rules::Rules;
pub use crate::summarize::summarize;

// src/analyze/mod.rs
//! Post-fetch stages over the merged candidate list: scoring, dedup/diversity,
//! and the summary analysis (key phrases).

pub mod concepts;
pub mod dedup;
pub mod recency;
pub mod scoring;
pub mod url_normalize;

// Re-export convenient types.
pub use crate::analyze::concepts::{top_concepts, MAX_CONCEPTS};
pub use crate::analyze::dedup::{cap_per_domain, deduplicate, title_key, DedupParams};
pub use crate::analyze::recency::recency_score;
pub use crate::analyze::scoring::{composite_score, Scored, Scorer};
pub use crate::analyze::url_normalize::{normalize_url, url_key};

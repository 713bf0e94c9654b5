// src/analyze/dedup.rs
//! Duplicate removal and per-domain diversity.
//!
//! - Two keys per candidate: canonical URL and a case-folded title prefix.
//!   A candidate is dropped if either key was already seen (first-seen wins),
//!   so the input must already be in provider priority order.
//! - Optional near-duplicate check: `strsim::normalized_levenshtein` between
//!   full titles, against the titles kept so far.
//! - Scores are never touched here; candidates are kept or dropped whole.

use std::collections::{HashMap, HashSet};
use strsim::normalized_levenshtein;

use crate::analyze::url_normalize::url_key;
use crate::candidate::ScoredCandidate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupParams {
    pub title_prefix_len: usize,
    /// Similarity in (0,1] at which two titles are the same story.
    pub near_duplicate_title: Option<f64>,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            title_prefix_len: 60,
            near_duplicate_title: None,
        }
    }
}

/// Case-folded, whitespace-collapsed first `len` chars of a title.
pub fn title_key(title: &str, len: usize) -> String {
    let folded = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    folded.chars().take(len).collect()
}

/// Keep the first candidate for every URL key and title key, in input order.
/// Returns survivors and the number dropped.
pub fn deduplicate(items: Vec<ScoredCandidate>, p: &DedupParams) -> (Vec<ScoredCandidate>, usize) {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut kept_titles: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for it in items {
        let u = url_key(it.url());
        let t = title_key(it.title(), p.title_prefix_len);

        let dup_key = seen_urls.contains(&u) || (!t.is_empty() && seen_titles.contains(&t));
        let full_title = it.title().to_lowercase();
        let near_dup = !dup_key
            && p.near_duplicate_title.is_some_and(|thr| {
                kept_titles
                    .iter()
                    .any(|k| normalized_levenshtein(k, &full_title) >= thr)
            });

        if dup_key || near_dup {
            tracing::debug!(domain = %it.domain(), near_dup, "duplicate dropped");
            dropped += 1;
            continue;
        }

        seen_urls.insert(u);
        if !t.is_empty() {
            seen_titles.insert(t);
        }
        kept_titles.push(full_title);
        out.push(it);
    }

    (out, dropped)
}

/// Keep at most `max` candidates per domain, preserving order. Run on the
/// ranked list so the best of each domain survive.
pub fn cap_per_domain(items: Vec<ScoredCandidate>, max: usize) -> (Vec<ScoredCandidate>, usize) {
    let mut per_domain: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for it in items {
        let n = per_domain.entry(it.domain().to_string()).or_insert(0);
        if *n >= max {
            dropped += 1;
            continue;
        }
        *n += 1;
        out.push(it);
    }
    (out, dropped)
}

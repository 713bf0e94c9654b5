//! # Source credibility
//!
//! Maps a candidate's domain to a credibility score in `[0.0, 5.0]` and adds
//! small content-quality nudges.
//!
//! - Loads from JSON config (domain scores + aliases), falls back to `default_seed()`.
//! - Lookup order: alias → exact domain → parent domain → `.gov` / academic
//!   suffix → news-like marker → default.
//! - A provider-level credibility hint replaces the table lookup.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

use crate::candidate::Candidate;

pub const MAX_CREDIBILITY: f32 = 5.0;

/// Word count at which content counts as long-form.
pub const LONG_CONTENT_WORDS: usize = 500;
pub const NUDGE_LONG_CONTENT: f32 = 0.2;
pub const NUDGE_QUOTED_SPEECH: f32 = 0.2;
pub const NUDGE_ATTRIBUTION: f32 = 0.3;

#[derive(Debug, Clone, Deserialize)]
pub struct CredibilityTable {
    /// Score when nothing else matches.
    #[serde(default = "default_default_score")]
    pub default_score: f32,
    #[serde(default = "default_gov_score")]
    pub gov_score: f32,
    /// `.edu`, `.ac.<cc>`.
    #[serde(default = "default_academic_score")]
    pub academic_score: f32,
    #[serde(default = "default_news_score")]
    pub news_score: f32,
    /// Substrings that make an unknown domain look like a news outlet.
    #[serde(default = "default_news_markers")]
    pub news_markers: Vec<String>,
    /// Registrable domain → score.
    #[serde(default)]
    pub domains: HashMap<String, f32>,
    /// Alternative domain → canonical domain.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_score() -> f32 {
    2.0
}
fn default_gov_score() -> f32 {
    4.8
}
fn default_academic_score() -> f32 {
    4.5
}
fn default_news_score() -> f32 {
    2.5
}
fn default_news_markers() -> Vec<String> {
    [
        "news", "times", "post", "herald", "tribune", "journal", "daily", "gazette", "press",
        "telegraph", "chronicle", "reporter",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CredibilityTable {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl CredibilityTable {
    /// Load from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<CredibilityTable>(&s) {
                Ok(t) => t.normalized(),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "bad credibility table, using seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    fn normalized(mut self) -> Self {
        self.domains = self
            .domains
            .into_iter()
            .map(|(k, v)| (normalize_domain(&k), v))
            .collect();
        self.aliases = self
            .aliases
            .into_iter()
            .map(|(k, v)| (normalize_domain(&k), normalize_domain(&v)))
            .collect();
        self.news_markers = self
            .news_markers
            .into_iter()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Table score for a domain (no nudges).
    pub fn score_for_domain(&self, domain: &str) -> f32 {
        let d = normalize_domain(domain);
        if d.is_empty() {
            return clamp05(self.default_score);
        }

        // 1) Alias resolution.
        if let Some(canon) = self.aliases.get(&d) {
            if let Some(&s) = self.domains.get(canon) {
                return clamp05(s);
            }
        }

        // 2) Exact, then 3) parent domains (news.bbc.co.uk → bbc.co.uk → co.uk).
        let mut cur = d.as_str();
        loop {
            if let Some(&s) = self.domains.get(cur) {
                return clamp05(s);
            }
            match cur.split_once('.') {
                Some((_, rest)) if rest.contains('.') => cur = rest,
                _ => break,
            }
        }

        // 4) Public-sector and academic suffixes.
        let labels: Vec<&str> = d.split('.').collect();
        let n = labels.len();
        if labels.last() == Some(&"gov") || (n >= 2 && labels[n - 2] == "gov") {
            return clamp05(self.gov_score);
        }
        if labels.last() == Some(&"edu")
            || (n >= 2 && matches!(labels[n - 2], "edu" | "ac"))
        {
            return clamp05(self.academic_score);
        }

        // 5) Looks like a news outlet.
        if self.news_markers.iter().any(|m| d.contains(m.as_str())) {
            return clamp05(self.news_score);
        }

        // 6) Default.
        clamp05(self.default_score)
    }

    /// Hint or table score, plus quality nudges, capped at 5.0.
    pub fn credibility_for(&self, c: &Candidate) -> f32 {
        let base = match c.credibility_hint {
            Some(h) if h.is_finite() => clamp05(h),
            _ => self.score_for_domain(&c.domain),
        };
        clamp05(base + quality_nudge(c))
    }

    /// Built-in seed: wire services and broadcasters at the top, then major
    /// newspapers and scholarly publishers.
    pub fn default_seed() -> Self {
        let mut domains = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("reuters.com", 5.0),
            ("apnews.com", 5.0),
            ("bbc.com", 5.0),
            ("bbc.co.uk", 5.0),
            ("afp.com", 5.0),
            ("nytimes.com", 4.5),
            ("wsj.com", 4.5),
            ("npr.org", 4.5),
            ("ft.com", 4.5),
            ("economist.com", 4.5),
            ("bloomberg.com", 4.5),
            ("washingtonpost.com", 4.3),
            ("theguardian.com", 4.3),
            ("cnn.com", 4.0),
            ("semanticscholar.org", 4.5),
            ("nature.com", 4.7),
            ("science.org", 4.7),
            ("arxiv.org", 4.2),
            ("wikipedia.org", 3.5),
            ("medium.com", 2.0),
        ] {
            domains.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("reut.rs", "reuters.com"),
            ("ap.org", "apnews.com"),
            ("nyti.ms", "nytimes.com"),
            ("guardian.co.uk", "theguardian.com"),
            ("on.ft.com", "ft.com"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_score: default_default_score(),
            gov_score: default_gov_score(),
            academic_score: default_academic_score(),
            news_score: default_news_score(),
            news_markers: default_news_markers(),
            domains,
            aliases,
        }
    }
}

/// Small upward nudges from the cleaned content: long-form, quoted speech,
/// attribution phrases.
pub fn quality_nudge(c: &Candidate) -> f32 {
    static RE_QUOTE: OnceCell<Regex> = OnceCell::new();
    static RE_ATTRIB: OnceCell<Regex> = OnceCell::new();

    let mut nudge = 0.0;
    if c.word_count >= LONG_CONTENT_WORDS {
        nudge += NUDGE_LONG_CONTENT;
    }
    let re_quote = RE_QUOTE.get_or_init(|| Regex::new(r#""[^"]{12,}""#).unwrap());
    if re_quote.is_match(&c.content) {
        nudge += NUDGE_QUOTED_SPEECH;
    }
    let re_attrib = RE_ATTRIB.get_or_init(|| {
        Regex::new(r"(?i)\b(according to|said in a statement|told reporters|a spokesperson|a spokesman|a spokeswoman|researchers (found|said)|study (found|published))\b")
            .unwrap()
    });
    if re_attrib.is_match(&c.content) {
        nudge += NUDGE_ATTRIBUTION;
    }
    nudge
}

/// Lowercase, trim, drop a trailing dot and a leading `www.`.
fn normalize_domain(s: &str) -> String {
    let d = s.trim().trim_end_matches('.').to_ascii_lowercase();
    d.strip_prefix("www.").map(str::to_string).unwrap_or(d)
}

fn clamp05(x: f32) -> f32 {
    x.clamp(0.0, MAX_CREDIBILITY)
}

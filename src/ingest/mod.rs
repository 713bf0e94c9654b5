// src/ingest/mod.rs
pub mod config;
pub mod http;
pub mod providers;
pub mod types;

use crate::candidate::{Candidate, SourceStrategy};
use crate::config::ResearchConfig;
use crate::error::Rejection;
use crate::ingest::types::RawRecord;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "research_records_total",
            "Raw records returned by providers."
        );
        describe_counter!(
            "research_rejected_total",
            "Records dropped by normalization (missing fields / empty content)."
        );
        describe_counter!(
            "research_offtopic_total",
            "Candidates below the relevance acceptance threshold."
        );
        describe_counter!(
            "research_scoring_errors_total",
            "Candidates dropped because scoring failed."
        );
        describe_counter!(
            "research_duplicates_total",
            "Candidates removed by URL/title deduplication."
        );
        describe_counter!(
            "research_provider_errors_total",
            "Provider fetch/parse/timeout errors."
        );
        describe_histogram!("research_fetch_ms", "Provider fetch time in milliseconds.");
        describe_histogram!("research_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "research_last_run_ts",
            "Unix ts when a research run last finished."
        );
    });
}

/// Bounds applied by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeLimits {
    pub min_content_chars: usize,
    pub content_max_chars: usize,
    pub snippet_max_chars: usize,
}

impl Default for NormalizeLimits {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for NormalizeLimits {
    fn from(c: &ResearchConfig) -> Self {
        Self {
            min_content_chars: c.min_content_chars,
            content_max_chars: c.content_max_chars,
            snippet_max_chars: c.snippet_max_chars,
        }
    }
}

/// Clean markup: decode entities, strip tags, fold typographic quotes, collapse whitespace.
pub fn clean_markup(s: &str) -> String {
    static RE_DROP: OnceCell<regex::Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();

    // 1) Drop script/style blocks wholesale
    let re_drop = RE_DROP.get_or_init(|| {
        regex::Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap()
    });
    let out = re_drop.replace_all(s, " ");

    // 2) Strip HTML tags (before decoding so `&lt;b&gt;` stays text)
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    let out = re_tags.replace_all(&out, " ");

    // 3) HTML entity decode
    let mut out = html_escape::decode_html_entities(&out).to_string();

    // 4) Normalize “ ” ‘ ’ « » to ASCII quotes, nbsp to space
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 5) Collapse whitespace
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Truncate to at most `max` chars, on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// Lowercased host of an http(s) url.
pub fn domain_of(raw_url: &str) -> Option<String> {
    let parsed = url::Url::parse(raw_url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Case-insensitive "any keyword occurs in text". Empty keyword lists match everything.
pub fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    let hay = text.to_lowercase();
    let mut any_configured = false;
    for k in keywords {
        let k = k.trim().to_lowercase();
        if k.is_empty() {
            continue;
        }
        any_configured = true;
        if hay.contains(&k) {
            return true;
        }
    }
    !any_configured
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Turn a raw provider record into a `Candidate`, or say why not.
pub fn normalize_record(
    raw: &RawRecord,
    strategy: SourceStrategy,
    provider: &str,
    limits: &NormalizeLimits,
) -> Result<Candidate, Rejection> {
    let url = non_blank(&raw.url).ok_or(Rejection::MissingUrl)?;
    let domain = domain_of(url).ok_or(Rejection::InvalidUrl)?;

    let title = non_blank(&raw.title)
        .map(clean_markup)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::MissingTitle)?;

    let description = non_blank(&raw.description)
        .map(clean_markup)
        .unwrap_or_default();
    let body = non_blank(&raw.content)
        .map(clean_markup)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| description.clone());

    let chars = body.chars().count();
    if chars < limits.min_content_chars {
        return Err(Rejection::ContentTooShort { chars });
    }

    let word_count = body.split_whitespace().count();
    let snippet_src = if description.is_empty() {
        &body
    } else {
        &description
    };

    Ok(Candidate {
        url: url.to_string(),
        title,
        snippet: truncate_chars(snippet_src, limits.snippet_max_chars),
        content: truncate_chars(&body, limits.content_max_chars),
        domain,
        published_at: raw.published_at,
        source_strategy: strategy,
        provider: provider.to_string(),
        author: non_blank(&raw.author).map(clean_markup),
        category: non_blank(&raw.category).map(str::to_string),
        word_count,
        credibility_hint: None,
    })
}

/// `normalize_record` without the reason.
pub fn normalize(
    raw: &RawRecord,
    strategy: SourceStrategy,
    provider: &str,
    limits: &NormalizeLimits,
) -> Option<Candidate> {
    normalize_record(raw, strategy, provider, limits).ok()
}

// src/candidate.rs
//! Canonical value types that flow through the research pipeline.
//!
//! - `Candidate` is what the normalizer emits: cleaned, bounded, validated.
//! - `ScoredCandidate` pairs a candidate with its final `Scores`. It is only ever
//!   built by the scorer once every sub-score is known, so a half-scored record
//!   never exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which provider family produced a candidate.
///
/// The declaration order doubles as the provider priority used for
/// first-seen-wins deduplication: web search, then academic search, then feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    WebSearch,
    AcademicSearch,
    Feed,
}

impl SourceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStrategy::WebSearch => "web_search",
            SourceStrategy::AcademicSearch => "academic_search",
            SourceStrategy::Feed => "feed",
        }
    }
}

impl fmt::Display for SourceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized discovered document. `url` and `title` are never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub content: String,
    pub snippet: String,
    pub domain: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source_strategy: SourceStrategy,
    /// Name of the configured provider that found this document.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Word count of the cleaned text before truncation.
    pub word_count: usize,
    /// Provider-level credibility override (0..=5), if configured.
    #[serde(skip)]
    pub credibility_hint: Option<f32>,
}

impl Candidate {
    /// Text the scorer looks at: title followed by the (truncated) content.
    pub fn scoring_text(&self) -> String {
        if self.content.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.content)
        }
    }
}

/// Final sub-scores of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    /// 0.0..=5.0
    #[serde(rename = "credibilityScore")]
    pub credibility: f32,
    /// 0.0..=1.0
    #[serde(rename = "relevanceScore")]
    pub relevance: f32,
    /// 0.0..=1.0
    #[serde(rename = "recencyScore")]
    pub recency: f32,
    #[serde(rename = "compositeScore")]
    pub composite: f32,
}

/// Immutable scored record; serialized flat (candidate fields + score fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(flatten)]
    pub scores: Scores,
}

impl ScoredCandidate {
    pub fn url(&self) -> &str {
        &self.candidate.url
    }

    pub fn title(&self) -> &str {
        &self.candidate.title
    }

    pub fn domain(&self) -> &str {
        &self.candidate.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate {
                url: "https://www.reuters.com/a".into(),
                title: "Title".into(),
                content: "Body".into(),
                snippet: "Body".into(),
                domain: "www.reuters.com".into(),
                published_at: None,
                source_strategy: SourceStrategy::Feed,
                provider: "Reuters".into(),
                author: None,
                category: None,
                word_count: 1,
                credibility_hint: Some(5.0),
            },
            scores: Scores {
                credibility: 5.0,
                relevance: 0.8,
                recency: 0.5,
                composite: 0.75,
            },
        }
    }

    #[test]
    fn serializes_flat_with_camel_case_score_names() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["url"], "https://www.reuters.com/a");
        assert_eq!(v["sourceStrategy"], "feed");
        assert!(v.get("relevanceScore").is_some());
        assert!(v.get("compositeScore").is_some());
        assert!(v.get("credibilityHint").is_none());
        assert!(v.get("author").is_none());
    }

    #[test]
    fn strategy_order_is_provider_priority() {
        let mut v = vec![
            SourceStrategy::Feed,
            SourceStrategy::WebSearch,
            SourceStrategy::AcademicSearch,
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                SourceStrategy::WebSearch,
                SourceStrategy::AcademicSearch,
                SourceStrategy::Feed
            ]
        );
    }

    #[test]
    fn scoring_text_joins_title_and_content() {
        let s = sample();
        assert_eq!(s.candidate.scoring_text(), "Title\nBody");
    }
}

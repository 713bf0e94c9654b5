// src/relevance.rs
//! Topic relevance: tokenizer, stopwords, the lexical heuristic, the semantic
//! path (similarity + shared-entity boost), and the acceptance gate.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::config::ResearchConfig;
use crate::error::ScoreError;
use crate::ingest::types::SemanticModel;

pub const ENV_DEV_LOG: &str = "RESEARCH_DEV_LOG";

/// Per matched topic entity (same text, same label).
pub const ENTITY_BOOST: f32 = 0.2;
/// Lexical blend: coverage vs. density.
pub const COVERAGE_WEIGHT: f32 = 0.7;
pub const DENSITY_WEIGHT: f32 = 0.3;
/// Density (matched words per 100 words) at which the density term saturates.
const DENSITY_CAP: f32 = 10.0;

// Dev logging gate: RESEARCH_DEV_LOG=1 AND dev env (debug or SHUTTLE_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Short, stable id for text we must not log verbatim.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub(crate) fn truncate_vec<T: ToString>(v: &[T], max: usize) -> Vec<String> {
    v.iter().take(max).map(|x| x.to_string()).collect()
}

fn dev_log_relevance(text: &str, rel: &Relevance, threshold: f32, accepted: bool) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    let matched_short = truncate_vec(&rel.matched, 5);
    // Never log raw text. Only hashed id + short lists.
    info!(
        target: "relevance",
        %id, score = rel.score, %threshold, accepted,
        mode = rel.mode.as_str(),
        matched = ?matched_short
    );
}

/* ----------------------------
Tokens
---------------------------- */

fn word_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // \w covers [A-Za-z0-9_]; (?u) enables Unicode
    RE.get_or_init(|| Regex::new(r"(?u)\b\w+\b").unwrap())
}

/// Lowercased word sequence.
pub fn words_lower(input: &str) -> Vec<String> {
    word_re()
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may",
    "me", "might", "more", "most", "much", "must", "my", "new", "no", "nor", "not", "now", "of",
    "off", "on", "once", "one", "only", "or", "other", "our", "ours", "out", "over", "own",
    "said", "same", "says", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "us", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

pub fn is_stopword(w: &str) -> bool {
    static SET: OnceCell<HashSet<&'static str>> = OnceCell::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
        .contains(w)
}

/// Query terms: topic tokens minus stopwords, then caller keywords (phrases kept whole).
/// A topic made only of stopwords or single letters ("The Who", "IT") keeps all
/// its tokens instead. Lowercased, deduplicated, first occurrence wins.
pub fn query_terms(topic: &str, keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let tokens = words_lower(topic);
    for w in &tokens {
        if is_stopword(w) || w.chars().count() < 2 {
            continue;
        }
        if seen.insert(w.clone()) {
            out.push(w.clone());
        }
    }
    if out.is_empty() {
        for w in tokens {
            if seen.insert(w.clone()) {
                out.push(w);
            }
        }
    }
    for k in keywords {
        let phrase = words_lower(k).join(" ");
        if phrase.is_empty() {
            continue;
        }
        if seen.insert(phrase.clone()) {
            out.push(phrase);
        }
    }
    out
}

// Occurrences of a (possibly multi-word) term in a lowercased word sequence.
fn count_phrase(words: &[String], term: &[&str]) -> usize {
    if term.is_empty() || words.len() < term.len() {
        return 0;
    }
    words
        .windows(term.len())
        .filter(|w| w.iter().zip(term).all(|(a, b)| a == b))
        .count()
}

/* ----------------------------
Scoring
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceMode {
    Lexical,
    Semantic,
}

impl RelevanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceMode::Lexical => "lexical",
            RelevanceMode::Semantic => "semantic",
        }
    }
}

/// Result of relevance evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Relevance {
    pub score: f32,
    pub mode: RelevanceMode,
    /// Query terms (lexical) or topic entities (semantic) that were found.
    pub matched: Vec<String>,
}

/// `0.7·coverage + 0.3·density` over lowercased words.
///
/// coverage = Σ len(term) of present terms / Σ len(term) of all terms.
/// density  = min(Σ count·words(term) per 100 text words, 10) / 10.
pub fn lexical_relevance(terms: &[String], text: &str) -> Relevance {
    let words = words_lower(text);
    let mut matched = Vec::new();
    if terms.is_empty() || words.is_empty() {
        return Relevance {
            score: 0.0,
            mode: RelevanceMode::Lexical,
            matched,
        };
    }

    let mut total_len = 0usize;
    let mut present_len = 0usize;
    let mut matched_words = 0usize;
    for term in terms {
        let parts: Vec<&str> = term.split(' ').filter(|p| !p.is_empty()).collect();
        let len = term.chars().count();
        total_len += len;
        let n = count_phrase(&words, &parts);
        if n > 0 {
            present_len += len;
            matched_words += n * parts.len();
            matched.push(term.clone());
        }
    }

    let coverage = if total_len == 0 {
        0.0
    } else {
        present_len as f32 / total_len as f32
    };
    let per_100 = matched_words as f32 * 100.0 / words.len() as f32;
    let density = per_100.min(DENSITY_CAP) / DENSITY_CAP;

    Relevance {
        score: (COVERAGE_WEIGHT * coverage + DENSITY_WEIGHT * density).clamp(0.0, 1.0),
        mode: RelevanceMode::Lexical,
        matched,
    }
}

// Lowercased entity text → label. Later duplicates overwrite earlier ones.
fn entity_map(model: &dyn SemanticModel, text: &str) -> HashMap<String, String> {
    model
        .entities(text)
        .into_iter()
        .map(|e| (e.text.trim().to_lowercase(), e.label))
        .filter(|(t, _)| !t.is_empty())
        .collect()
}

/// Similarity clamped to [0,1], plus `ENTITY_BOOST` per topic entity the text
/// shares with the same label, capped at 1.0.
pub fn semantic_relevance(
    model: &dyn SemanticModel,
    topic: &str,
    topic_entities: &HashMap<String, String>,
    text: &str,
) -> Result<Relevance, ScoreError> {
    let sim = model
        .similarity(topic, text)
        .map_err(|e| ScoreError::Model(e.to_string()))?;
    if !sim.is_finite() {
        return Err(ScoreError::NonFinite("similarity"));
    }

    let text_entities = entity_map(model, text);
    let mut matched: Vec<String> = topic_entities
        .iter()
        .filter(|(t, label)| text_entities.get(*t) == Some(*label))
        .map(|(t, _)| t.clone())
        .collect();
    matched.sort();

    let boost = ENTITY_BOOST * matched.len() as f32;
    Ok(Relevance {
        score: (sim.clamp(0.0, 1.0) + boost).min(1.0),
        mode: RelevanceMode::Semantic,
        matched,
    })
}

/// Per-run relevance scorer: topic-derived state computed once, then applied
/// to every candidate text.
#[derive(Clone)]
pub struct RelevanceScorer {
    topic: String,
    terms: Vec<String>,
    model: Option<Arc<dyn SemanticModel>>,
    topic_entities: HashMap<String, String>,
    threshold: f32,
}

impl RelevanceScorer {
    pub fn new(
        topic: &str,
        keywords: &[String],
        model: Option<Arc<dyn SemanticModel>>,
        cfg: &ResearchConfig,
    ) -> Self {
        let topic_entities = model
            .as_deref()
            .map(|m| entity_map(m, topic))
            .unwrap_or_default();
        let threshold = if model.is_some() {
            cfg.semantic_threshold
        } else {
            cfg.lexical_threshold
        };
        Self {
            topic: topic.trim().to_string(),
            terms: query_terms(topic, keywords),
            model,
            topic_entities,
            threshold,
        }
    }

    pub fn mode(&self) -> RelevanceMode {
        if self.model.is_some() {
            RelevanceMode::Semantic
        } else {
            RelevanceMode::Lexical
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn score(&self, text: &str) -> Result<Relevance, ScoreError> {
        let rel = match &self.model {
            Some(m) => semantic_relevance(m.as_ref(), &self.topic, &self.topic_entities, text)?,
            None => lexical_relevance(&self.terms, text),
        };
        if !rel.score.is_finite() {
            return Err(ScoreError::NonFinite("relevance"));
        }
        dev_log_relevance(text, &rel, self.threshold, self.accepts(rel.score));
        Ok(rel)
    }

    /// Acceptance gate for the active mode.
    pub fn accepts(&self, score: f32) -> bool {
        score >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Entity;

    #[test]
    fn words_are_lowercased_unicode_tokens() {
        assert_eq!(
            words_lower("Quantum-computing, in Zürich 2024!"),
            vec!["quantum", "computing", "in", "zürich", "2024"]
        );
    }

    #[test]
    fn query_terms_drop_stopwords_and_keep_phrases() {
        let kw = vec!["Error Correction".to_string(), "quantum".into()];
        let t = query_terms("The future of Quantum Computing", &kw);
        assert_eq!(t, vec!["future", "quantum", "computing", "error correction"]);
    }

    #[test]
    fn all_stopword_topics_keep_their_tokens() {
        assert_eq!(query_terms("IT", &[]), vec!["it"]);
        assert_eq!(query_terms("what is it", &[]), vec!["what", "is", "it"]);
        assert_eq!(
            query_terms("The Who", &["live album".to_string()]),
            vec!["the", "who", "live album"]
        );

        let cfg = ResearchConfig::default();
        let s = RelevanceScorer::new("The Who", &[], None, &cfg);
        let hit = s.score("The Who announce a new tour; The Who live").unwrap();
        assert!(s.accepts(hit.score), "{}", hit.score);
        let miss = s.score("Quarterly earnings beat expectations").unwrap();
        assert!(!s.accepts(miss.score), "{}", miss.score);
    }

    #[test]
    fn lexical_full_match_is_high_and_miss_is_zero() {
        let terms = query_terms("quantum computing", &[]);
        let hit = lexical_relevance(
            &terms,
            "Quantum computing news: quantum computing startups raise money",
        );
        assert!(hit.score > 0.99, "{}", hit.score);
        assert_eq!(hit.matched.len(), 2);

        let miss = lexical_relevance(&terms, "Football results from the weekend");
        assert_eq!(miss.score, 0.0);
    }

    #[test]
    fn lexical_coverage_is_length_weighted() {
        let terms = query_terms("quantum ai", &[]);
        // Only "quantum" (7 of 9 chars), once in 100 words → density 0.1
        let mut text = String::from("quantum");
        for _ in 0..99 {
            text.push_str(" filler");
        }
        let r = lexical_relevance(&terms, &text);
        let expected = 0.7 * (7.0 / 9.0) + 0.3 * 0.1;
        assert!((r.score - expected).abs() < 1e-4, "{} vs {}", r.score, expected);
    }

    struct FixedModel {
        sim: f32,
    }

    impl SemanticModel for FixedModel {
        fn similarity(&self, _a: &str, _b: &str) -> anyhow::Result<f32> {
            if self.sim.is_nan() {
                anyhow::bail!("no vectors");
            }
            Ok(self.sim)
        }
        fn entities(&self, text: &str) -> Vec<Entity> {
            let mut out = Vec::new();
            if text.contains("IBM") {
                out.push(Entity {
                    text: "IBM".into(),
                    label: "ORG".into(),
                });
            }
            if text.contains("Google") {
                out.push(Entity {
                    text: "google".into(),
                    label: if text.contains("person") { "PERSON" } else { "ORG" }.into(),
                });
            }
            out
        }
    }

    #[test]
    fn semantic_boost_requires_same_label_and_caps() {
        let cfg = ResearchConfig::default();
        let m: Arc<dyn SemanticModel> = Arc::new(FixedModel { sim: 0.5 });
        let s = RelevanceScorer::new("IBM and Google quantum", &[], Some(m), &cfg);
        assert_eq!(s.mode(), RelevanceMode::Semantic);
        assert!((s.threshold() - 0.55).abs() < 1e-6);

        let both = s.score("IBM and Google ship qubits").unwrap();
        assert!((both.score - 0.9).abs() < 1e-6);
        let one = s.score("IBM ships; Google the person").unwrap();
        assert!((one.score - 0.7).abs() < 1e-6);

        let m: Arc<dyn SemanticModel> = Arc::new(FixedModel { sim: 0.95 });
        let s = RelevanceScorer::new("IBM and Google", &[], Some(m), &cfg);
        assert_eq!(s.score("IBM Google").unwrap().score, 1.0);
    }

    #[test]
    fn model_failure_is_a_score_error() {
        let cfg = ResearchConfig::default();
        let m: Arc<dyn SemanticModel> = Arc::new(FixedModel { sim: f32::NAN });
        let s = RelevanceScorer::new("x", &[], Some(m), &cfg);
        assert!(matches!(s.score("anything"), Err(ScoreError::Model(_))));
        let m: Arc<dyn SemanticModel> = Arc::new(FixedModel {
            sim: f32::INFINITY,
        });
        let s = RelevanceScorer::new("x", &[], Some(m), &cfg);
        assert!(matches!(s.score("anything"), Err(ScoreError::NonFinite(_))));
    }

    #[test]
    fn lexical_gate_uses_lexical_threshold() {
        let cfg = ResearchConfig::default();
        let s = RelevanceScorer::new("quantum computing", &[], None, &cfg);
        assert_eq!(s.mode(), RelevanceMode::Lexical);
        assert!(s.accepts(0.35));
        assert!(!s.accepts(0.34));
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc").len(), 12);
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_ne!(anon_hash("abc"), anon_hash("abd"));
    }
}

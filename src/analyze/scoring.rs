//! Candidate scoring: relevance gate, recency, credibility, composite.
//!
//! `composite = w_relevance·relevance + w_recency·recency + w_credibility·(credibility/5)`
//! with the weights from `ScoreWeights` (0.5 / 0.3 / 0.2 unless configured).

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::analyze::recency::recency_score;
use crate::candidate::{Candidate, ScoredCandidate, Scores};
use crate::config::ScoreWeights;
use crate::error::ScoreError;
use crate::relevance::RelevanceScorer;
use crate::source_weights::{CredibilityTable, MAX_CREDIBILITY};

/// Weighted sum of the three sub-scores. Credibility is rescaled to [0,1] first.
pub fn composite_score(w: &ScoreWeights, relevance: f32, recency: f32, credibility: f32) -> f32 {
    w.relevance * relevance + w.recency * recency + w.credibility * (credibility / MAX_CREDIBILITY)
}

/// Outcome for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Scored {
    Accepted(ScoredCandidate),
    /// Below the relevance acceptance threshold; never ranked.
    OffTopic { relevance: f32 },
}

/// Scores candidates of one run against a fixed `now`.
pub struct Scorer {
    relevance: RelevanceScorer,
    credibility: Arc<CredibilityTable>,
    weights: ScoreWeights,
    now: DateTime<Utc>,
}

impl Scorer {
    pub fn new(
        relevance: RelevanceScorer,
        credibility: Arc<CredibilityTable>,
        weights: ScoreWeights,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            relevance,
            credibility,
            weights,
            now,
        }
    }

    pub fn relevance(&self) -> &RelevanceScorer {
        &self.relevance
    }

    pub fn score(&self, candidate: Candidate) -> Result<Scored, ScoreError> {
        let rel = self.relevance.score(&candidate.scoring_text())?.score;
        if !self.relevance.accepts(rel) {
            return Ok(Scored::OffTopic { relevance: rel });
        }

        let recency = recency_score(candidate.published_at, self.now);
        let credibility = self.credibility.credibility_for(&candidate);
        let composite = composite_score(&self.weights, rel, recency, credibility);
        for (name, v) in [
            ("recency", recency),
            ("credibility", credibility),
            ("composite", composite),
        ] {
            if !v.is_finite() {
                return Err(ScoreError::NonFinite(name));
            }
        }

        Ok(Scored::Accepted(ScoredCandidate {
            candidate,
            scores: Scores {
                credibility,
                relevance: rel,
                recency,
                composite,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SourceStrategy;
    use crate::config::ResearchConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn cand(title: &str, content: &str, domain: &str) -> Candidate {
        Candidate {
            url: format!("https://{domain}/a"),
            title: title.into(),
            content: content.into(),
            snippet: String::new(),
            domain: domain.into(),
            published_at: Some(now() - Duration::days(15)),
            source_strategy: SourceStrategy::WebSearch,
            provider: "ddg".into(),
            author: None,
            category: None,
            word_count: 20,
            credibility_hint: None,
        }
    }

    fn scorer(topic: &str) -> Scorer {
        let cfg = ResearchConfig::default();
        Scorer::new(
            RelevanceScorer::new(topic, &[], None, &cfg),
            Arc::new(CredibilityTable::default_seed()),
            cfg.weights,
            now(),
        )
    }

    #[test]
    fn composite_uses_default_weights() {
        let w = ScoreWeights::default();
        assert!((composite_score(&w, 1.0, 1.0, 5.0) - 1.0).abs() < 1e-6);
        assert!((composite_score(&w, 0.8, 0.5, 2.5) - (0.4 + 0.15 + 0.1)).abs() < 1e-6);
    }

    #[test]
    fn accepted_candidate_has_all_scores_in_range() {
        let s = scorer("quantum computing");
        let c = cand(
            "Quantum computing breakthrough",
            "A new quantum computing chip was shown.",
            "reuters.com",
        );
        match s.score(c).unwrap() {
            Scored::Accepted(sc) => {
                let sc = sc.scores;
                assert!((0.0..=1.0).contains(&sc.relevance));
                assert!((sc.recency - 0.5).abs() < 1e-6);
                assert_eq!(sc.credibility, 5.0);
                let expected = 0.5 * sc.relevance + 0.3 * 0.5 + 0.2;
                assert!((sc.composite - expected).abs() < 1e-5);
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn off_topic_is_gated() {
        let s = scorer("quantum computing");
        let c = cand("Cup final", "The home side won the cup final.", "bbc.com");
        assert_eq!(s.score(c).unwrap(), Scored::OffTopic { relevance: 0.0 });
    }
}

// src/pipeline.rs
//! Research run orchestration.
//!
//! `Idle → Fetching → Normalizing → Scoring → Deduplicating → Ranking → Done`
//!
//! Fetching is the only concurrent stage: one tokio task per provider, each
//! under its own timeout, joined with `join_all`. A provider error, timeout or
//! panic becomes that provider's `ProviderStatus` and nothing else. Everything
//! after the barrier is a plain single-threaded pass over the merged list.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analyze::{
    cap_per_domain, deduplicate, top_concepts, DedupParams, Scored, Scorer, MAX_CONCEPTS,
};
use crate::candidate::{Candidate, ScoredCandidate};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use crate::ingest::config::{validate_specs, ProviderSpec};
use crate::ingest::providers::{build_providers, Collaborators};
use crate::ingest::types::{Query, RawRecord, SourceProvider};
use crate::ingest::{ensure_metrics_described, normalize_record, NormalizeLimits};
use crate::relevance::{anon_hash, RelevanceScorer};
use crate::source_weights::CredibilityTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Fetching,
    Normalizing,
    Scoring,
    Deduplicating,
    Ranking,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchState {
    Ok,
    Error,
}

/// Outcome of one provider's fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub items_found: usize,
    pub status: FetchState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderStatus {
    pub fn ok(items_found: usize) -> Self {
        Self {
            items_found,
            status: FetchState::Ok,
            error: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            items_found: 0,
            status: FetchState::Error,
            error: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchState::Ok
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub raw_records: usize,
    pub rejected: usize,
    pub off_topic: usize,
    pub scoring_errors: usize,
    pub duplicates: usize,
    pub domain_capped: usize,
    pub ranked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub total_sources: usize,
    pub avg_score: f32,
    pub domains: Vec<String>,
    pub top_concepts: Vec<String>,
    pub summary: String,
    pub stats: PipelineStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub success: bool,
    pub topic: String,
    pub sources: Vec<ScoredCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    pub provider_status: BTreeMap<String, ProviderStatus>,
    /// RFC 3339.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResearchResult {
    fn failure(topic: &str, err: &ResearchError, now: DateTime<Utc>) -> Self {
        Self {
            success: false,
            topic: topic.to_string(),
            sources: Vec::new(),
            analysis: None,
            provider_status: BTreeMap::new(),
            timestamp: now.to_rfc3339(),
            error: Some(err.to_string()),
        }
    }
}

/// One research request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchRequest {
    pub topic: String,
    pub max_sources: usize,
    /// Extra terms for lexical relevance.
    pub keywords: Vec<String>,
    pub providers: Vec<ProviderSpec>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>, max_sources: usize, providers: Vec<ProviderSpec>) -> Self {
        Self {
            topic: topic.into(),
            max_sources,
            keywords: Vec::new(),
            providers,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// Orchestrator. Holds configuration and collaborators; no state survives a run.
pub struct Researcher {
    config: ResearchConfig,
    collaborators: Collaborators,
    credibility: Arc<CredibilityTable>,
}

impl Researcher {
    /// Loads the credibility table from `config.credibility_path` (seed on failure).
    pub fn new(config: ResearchConfig, collaborators: Collaborators) -> Self {
        let credibility = Arc::new(CredibilityTable::load_from_file(&config.credibility_path));
        Self {
            config,
            collaborators,
            credibility,
        }
    }

    pub fn with_credibility(mut self, table: CredibilityTable) -> Self {
        self.credibility = Arc::new(table);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn credibility(&self) -> &CredibilityTable {
        &self.credibility
    }

    /// Library entry: topic, bound, provider list.
    pub async fn research(
        &self,
        topic: &str,
        max_sources: usize,
        providers: &[ProviderSpec],
    ) -> ResearchResult {
        let req = ResearchRequest::new(topic, max_sources, providers.to_vec());
        self.run(&req, Utc::now()).await
    }

    /// Full entry with an explicit clock.
    pub async fn run(&self, req: &ResearchRequest, now: DateTime<Utc>) -> ResearchResult {
        ensure_metrics_described();
        let topic_id = anon_hash(req.topic.trim());

        if let Err(e) = validate_request(req) {
            warn!(%topic_id, error = %e, "research request rejected");
            return ResearchResult::failure(&req.topic, &e, now);
        }

        let mut run = Run::new(&topic_id);
        let topic = req.topic.trim();

        // Fetching
        run.enter(Stage::Fetching);
        let query = Query::new(
            topic,
            self.config.per_provider_limit.max(req.max_sources),
        )
        .with_keywords(req.keywords.clone());
        let providers = build_providers(&req.providers, &self.collaborators);
        let fetched = fetch_all(&providers, query, self.config.provider_timeout()).await;

        // Normalizing (provider priority order: strategy, then config order)
        run.enter(Stage::Normalizing);
        let limits = NormalizeLimits::from(&self.config);
        let mut order: Vec<usize> = (0..providers.len()).collect();
        order.sort_by_key(|&i| providers[i].strategy());

        let mut provider_status = BTreeMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        for &i in &order {
            let p = &providers[i];
            match &fetched[i] {
                Ok(records) => {
                    provider_status.insert(p.name().to_string(), ProviderStatus::ok(records.len()));
                    run.stats.raw_records += records.len();
                    for raw in records {
                        match normalize_record(raw, p.strategy(), p.name(), &limits) {
                            Ok(mut c) => {
                                c.credibility_hint = p.credibility_hint();
                                candidates.push(c);
                            }
                            Err(reason) => {
                                debug!(provider = p.name(), %reason, "record rejected");
                                run.stats.rejected += 1;
                            }
                        }
                    }
                }
                Err(reason) => {
                    provider_status.insert(p.name().to_string(), ProviderStatus::error(reason.clone()));
                }
            }
        }
        counter!("research_rejected_total").increment(run.stats.rejected as u64);

        // Scoring
        run.enter(Stage::Scoring);
        let relevance = RelevanceScorer::new(
            topic,
            &req.keywords,
            self.collaborators.semantic.clone(),
            &self.config,
        );
        let scorer = Scorer::new(relevance, self.credibility.clone(), self.config.weights, now);
        let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(candidates.len());
        for c in candidates {
            let domain = c.domain.clone();
            match scorer.score(c) {
                Ok(Scored::Accepted(sc)) => scored.push(sc),
                Ok(Scored::OffTopic { .. }) => run.stats.off_topic += 1,
                Err(e) => {
                    warn!(%domain, error = %e, "candidate dropped while scoring");
                    run.stats.scoring_errors += 1;
                }
            }
        }
        counter!("research_offtopic_total").increment(run.stats.off_topic as u64);
        counter!("research_scoring_errors_total").increment(run.stats.scoring_errors as u64);

        // Deduplicating
        run.enter(Stage::Deduplicating);
        let params = DedupParams {
            title_prefix_len: self.config.title_prefix_len,
            near_duplicate_title: self.config.near_duplicate_title,
        };
        let (unique, dups) = deduplicate(scored, &params);
        run.stats.duplicates = dups;
        counter!("research_duplicates_total").increment(dups as u64);

        // Ranking
        run.enter(Stage::Ranking);
        let mut ranked = rank(unique);
        if let Some(max) = self.config.max_per_domain {
            let (capped, n) = cap_per_domain(ranked, max);
            ranked = capped;
            run.stats.domain_capped = n;
        }
        run.stats.ranked = ranked.len();

        let analysis = analyze(topic, &ranked, run.stats.clone());
        ranked.truncate(req.max_sources);

        run.enter(Stage::Done);
        gauge!("research_last_run_ts").set(now.timestamp() as f64);
        info!(
            %topic_id,
            sources = ranked.len(),
            providers_ok = provider_status.values().filter(|s| s.is_ok()).count(),
            providers_failed = provider_status.values().filter(|s| !s.is_ok()).count(),
            "research run finished"
        );

        ResearchResult {
            success: true,
            topic: topic.to_string(),
            sources: ranked,
            analysis: Some(analysis),
            provider_status,
            timestamp: now.to_rfc3339(),
            error: None,
        }
    }
}

/// Per-run bookkeeping.
struct Run<'a> {
    topic_id: &'a str,
    stage: Stage,
    started: Instant,
    stats: PipelineStats,
}

impl<'a> Run<'a> {
    fn new(topic_id: &'a str) -> Self {
        Self {
            topic_id,
            stage: Stage::Idle,
            started: Instant::now(),
            stats: PipelineStats::default(),
        }
    }

    fn enter(&mut self, next: Stage) {
        debug!(
            topic_id = self.topic_id,
            from = ?self.stage,
            to = ?next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "stage"
        );
        self.stage = next;
    }
}

fn validate_request(req: &ResearchRequest) -> Result<(), ResearchError> {
    if req.topic.trim().is_empty() {
        return Err(ResearchError::InvalidInput("topic must not be empty".into()));
    }
    if req.max_sources == 0 {
        return Err(ResearchError::InvalidInput(
            "maxSources must be at least 1".into(),
        ));
    }
    validate_specs(&req.providers)
}

/// Fan-out/fan-in. Result `i` belongs to `providers[i]`.
async fn fetch_all(
    providers: &[Arc<dyn SourceProvider>],
    query: Query,
    timeout: Duration,
) -> Vec<Result<Vec<RawRecord>, String>> {
    let query = Arc::new(query);
    let handles = providers.iter().map(|p| {
        let p = Arc::clone(p);
        let q = Arc::clone(&query);
        tokio::spawn(async move {
            let t0 = Instant::now();
            let out = tokio::time::timeout(timeout, p.fetch(&q)).await;
            histogram!("research_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            match out {
                Ok(Ok(records)) => Ok(records),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err(format!("timed out after {timeout:?}")),
            }
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .zip(providers)
        .map(|(joined, p)| {
            let res = joined.unwrap_or_else(|e| Err(format!("provider task failed: {e}")));
            if let Err(reason) = &res {
                warn!(provider = p.name(), error = %reason, "provider failed");
                counter!("research_provider_errors_total").increment(1);
            }
            res
        })
        .collect()
}

/// Composite desc, then recency desc; stable, so discovery order breaks ties.
pub fn rank(mut items: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    items.sort_by(|a, b| {
        b.scores
            .composite
            .total_cmp(&a.scores.composite)
            .then_with(|| b.scores.recency.total_cmp(&a.scores.recency))
    });
    items
}

fn analyze(topic: &str, ranked: &[ScoredCandidate], stats: PipelineStats) -> Analysis {
    let total = ranked.len();
    let avg_score = if total == 0 {
        0.0
    } else {
        ranked.iter().map(|s| s.scores.composite).sum::<f32>() / total as f32
    };
    let domains: BTreeSet<&str> = ranked.iter().map(|s| s.domain()).collect();
    let concepts = top_concepts(
        ranked.iter().map(|s| s.candidate.content.as_str()),
        topic,
        MAX_CONCEPTS,
    );
    let summary = if total == 0 {
        format!("No relevant sources found for topic: {topic}")
    } else {
        format!("Found {total} high-quality sources.")
    };
    Analysis {
        total_sources: total,
        avg_score,
        domains: domains.into_iter().map(str::to_string).collect(),
        top_concepts: concepts,
        summary,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Scores, SourceStrategy};

    fn sc(title: &str, composite: f32, recency: f32) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate {
                url: format!("https://example.com/{title}"),
                title: title.into(),
                content: String::new(),
                snippet: String::new(),
                domain: "example.com".into(),
                published_at: None,
                source_strategy: SourceStrategy::Feed,
                provider: "p".into(),
                author: None,
                category: None,
                word_count: 0,
                credibility_hint: None,
            },
            scores: Scores {
                credibility: 2.0,
                relevance: 0.5,
                recency,
                composite,
            },
        }
    }

    #[test]
    fn ranking_is_stable_with_recency_tiebreak() {
        let ranked = rank(vec![
            sc("a", 0.5, 0.2),
            sc("b", 0.7, 0.1),
            sc("c", 0.5, 0.9),
            sc("d", 0.5, 0.2),
        ]);
        let titles: Vec<_> = ranked.iter().map(|s| s.title()).collect();
        assert_eq!(titles, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn empty_analysis_summary() {
        let a = analyze("rust", &[], PipelineStats::default());
        assert_eq!(a.summary, "No relevant sources found for topic: rust");
        assert_eq!(a.avg_score, 0.0);
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let spec = ProviderSpec::new("w", SourceStrategy::WebSearch, "");
        assert!(validate_request(&ResearchRequest::new("  ", 3, vec![spec.clone()])).is_err());
        assert!(validate_request(&ResearchRequest::new("x", 0, vec![spec.clone()])).is_err());
        assert!(validate_request(&ResearchRequest::new("x", 3, vec![])).is_err());
        assert!(validate_request(&ResearchRequest::new("x", 3, vec![spec])).is_ok());
    }

    #[test]
    fn status_serializes_lowercase() {
        let v = serde_json::to_value(ProviderStatus::error("boom")).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["itemsFound"], 0);
        assert_eq!(v["error"], "boom");
        let v = serde_json::to_value(ProviderStatus::ok(3)).unwrap();
        assert!(v.get("error").is_none());
    }
}

// src/ingest/types.rs
//! Raw records, the per-run query, the adapter contract, and the narrow
//! collaborator interfaces adapters consume (search engines, feed transport,
//! article extraction, similarity model).

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::candidate::SourceStrategy;

/// Provider-shaped record before normalization. Fields may be missing or dirty.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    /// Full body text or HTML, when the provider has one.
    pub content: Option<String>,
    /// Short description / abstract / search snippet.
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub category: Option<String>,
}

/// Read-only input shared by every adapter during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub topic: String,
    /// Extra keywords (from the caller); also used by lexical relevance.
    pub keywords: Vec<String>,
    /// Upper bound of records each adapter should return.
    pub limit: usize,
}

impl Query {
    pub fn new(topic: impl Into<String>, limit: usize) -> Self {
        Self {
            topic: topic.into(),
            keywords: Vec::new(),
            limit,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// One independently failable source of raw records.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, query: &Query) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &str;
    fn strategy(&self) -> SourceStrategy;
    /// Credibility override applied to everything this provider yields.
    fn credibility_hint(&self) -> Option<f32> {
        None
    }
}

/* ----------------------------
Collaborator interfaces
---------------------------- */

/// A single hit from a web search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Result of downloading + parsing one article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<Article>;
}

/// One paper from an academic index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    pub url: Option<String>,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
}

#[async_trait::async_trait]
pub trait PaperSearch: Send + Sync {
    async fn search_papers(&self, query: &str, limit: usize) -> Result<Vec<Paper>>;
}

/// Transport for feed documents (URL → raw XML body).
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<String>;
}

/// A named entity found by the similarity model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

/// Optional semantic similarity capability. Synchronous: scoring runs after fan-in.
pub trait SemanticModel: Send + Sync {
    /// Similarity of two texts in [0, 1].
    fn similarity(&self, a: &str, b: &str) -> Result<f32>;
    fn entities(&self, text: &str) -> Vec<Entity>;
}

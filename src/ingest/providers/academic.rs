// src/ingest/providers/academic.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

use crate::candidate::SourceStrategy;
use crate::ingest::config::expand_query_template;
use crate::ingest::types::{Paper, PaperSearch, Query, RawRecord, SourceProvider};

/// Academic index adapter. Abstract is the content; authors are joined.
pub struct AcademicSearchProvider {
    name: String,
    query_template: String,
    papers: Arc<dyn PaperSearch>,
    credibility_hint: Option<f32>,
}

impl AcademicSearchProvider {
    pub fn new(name: impl Into<String>, papers: Arc<dyn PaperSearch>) -> Self {
        Self {
            name: name.into(),
            query_template: String::new(),
            papers,
            credibility_hint: None,
        }
    }

    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = template.into();
        self
    }

    pub fn with_credibility(mut self, hint: Option<f32>) -> Self {
        self.credibility_hint = hint;
        self
    }
}

fn record_from_paper(p: Paper) -> RawRecord {
    let author = if p.authors.is_empty() {
        None
    } else {
        Some(p.authors.join(", "))
    };
    RawRecord {
        url: p.url,
        title: p.title,
        content: p.abstract_text,
        description: None,
        published_at: p.published_at,
        author,
        category: Some("academic".to_string()),
    }
}

#[async_trait]
impl SourceProvider for AcademicSearchProvider {
    async fn fetch(&self, query: &Query) -> Result<Vec<RawRecord>> {
        let q = expand_query_template(&self.query_template, &query.topic);
        let papers = self
            .papers
            .search_papers(&q, query.limit)
            .await
            .context("paper search")?;

        let out: Vec<RawRecord> = papers
            .into_iter()
            .take(query.limit)
            .map(record_from_paper)
            .collect();

        counter!("research_records_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> SourceStrategy {
        SourceStrategy::AcademicSearch
    }

    fn credibility_hint(&self) -> Option<f32> {
        self.credibility_hint
    }
}

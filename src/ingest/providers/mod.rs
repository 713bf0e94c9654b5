// src/ingest/providers/mod.rs
pub mod academic;
pub mod feed;
pub mod web_search;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::candidate::SourceStrategy;
use crate::ingest::config::ProviderSpec;
use crate::ingest::types::{
    ArticleExtractor, FeedFetcher, PaperSearch, Query, RawRecord, SemanticModel, SourceProvider,
    WebSearch,
};

pub use academic::AcademicSearchProvider;
pub use feed::{FeedProvider, StaticFeed};
pub use web_search::WebSearchProvider;

/// Backends the adapters talk to. Anything left `None` makes the matching
/// providers fail at fetch time.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub extractor: Option<Arc<dyn ArticleExtractor>>,
    pub papers: Option<Arc<dyn PaperSearch>>,
    pub feeds: Option<Arc<dyn FeedFetcher>>,
    pub semantic: Option<Arc<dyn SemanticModel>>,
}

impl Collaborators {
    pub fn with_web_search(mut self, s: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(s);
        self
    }

    pub fn with_extractor(mut self, e: Arc<dyn ArticleExtractor>) -> Self {
        self.extractor = Some(e);
        self
    }

    pub fn with_papers(mut self, p: Arc<dyn PaperSearch>) -> Self {
        self.papers = Some(p);
        self
    }

    pub fn with_feeds(mut self, f: Arc<dyn FeedFetcher>) -> Self {
        self.feeds = Some(f);
        self
    }

    pub fn with_semantic(mut self, m: Arc<dyn SemanticModel>) -> Self {
        self.semantic = Some(m);
        self
    }
}

/// Placeholder for a spec whose backend is not configured.
struct Unavailable {
    name: String,
    strategy: SourceStrategy,
    reason: &'static str,
}

#[async_trait]
impl SourceProvider for Unavailable {
    async fn fetch(&self, _query: &Query) -> Result<Vec<RawRecord>> {
        bail!("{}", self.reason)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> SourceStrategy {
        self.strategy
    }
}

fn unavailable(spec: &ProviderSpec, reason: &'static str) -> Arc<dyn SourceProvider> {
    Arc::new(Unavailable {
        name: spec.name.clone(),
        strategy: spec.kind,
        reason,
    })
}

/// One adapter per spec, in spec order.
pub fn build_providers(specs: &[ProviderSpec], c: &Collaborators) -> Vec<Arc<dyn SourceProvider>> {
    specs
        .iter()
        .map(|spec| -> Arc<dyn SourceProvider> {
            match spec.kind {
                SourceStrategy::WebSearch => match &c.web_search {
                    Some(search) => Arc::new(
                        WebSearchProvider::new(spec.name.clone(), search.clone())
                            .with_query_template(spec.endpoint_or_query.clone())
                            .with_extractor(c.extractor.clone())
                            .with_credibility(spec.credibility_hint),
                    ),
                    None => unavailable(spec, "no web search backend configured"),
                },
                SourceStrategy::AcademicSearch => match &c.papers {
                    Some(papers) => Arc::new(
                        AcademicSearchProvider::new(spec.name.clone(), papers.clone())
                            .with_query_template(spec.endpoint_or_query.clone())
                            .with_credibility(spec.credibility_hint),
                    ),
                    None => unavailable(spec, "no paper search backend configured"),
                },
                SourceStrategy::Feed => match &c.feeds {
                    Some(fetcher) => Arc::new(
                        FeedProvider::new(
                            spec.name.clone(),
                            spec.endpoint_or_query.clone(),
                            fetcher.clone(),
                        )
                        .with_keywords(spec.keywords.clone())
                        .with_category(spec.category.clone())
                        .with_credibility(spec.credibility_hint),
                    ),
                    None => unavailable(spec, "no feed transport configured"),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_backends_fail_at_fetch_time() {
        let specs = vec![
            ProviderSpec::new("ddg", SourceStrategy::WebSearch, ""),
            ProviderSpec::new("bbc", SourceStrategy::Feed, "https://feeds.bbci.co.uk/news/rss.xml")
                .with_credibility(4.5),
        ];
        let c = Collaborators::default().with_feeds(Arc::new(StaticFeed::new("<rss/>")));
        let built = build_providers(&specs, &c);
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].name(), "ddg");
        assert_eq!(built[1].credibility_hint(), Some(4.5));

        let err = built[0].fetch(&Query::new("x", 3)).await.unwrap_err();
        assert!(err.to_string().contains("no web search backend"));
    }
}

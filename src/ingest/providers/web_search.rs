// src/ingest/providers/web_search.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use metrics::counter;
use std::sync::Arc;

use crate::candidate::SourceStrategy;
use crate::ingest::config::expand_query_template;
use crate::ingest::types::{ArticleExtractor, Query, RawRecord, SearchHit, SourceProvider, WebSearch};

/// Extra hits requested on top of `limit`, since some never yield usable articles.
const HIT_HEADROOM: usize = 5;
/// Article extractions in flight at once per fetch.
pub const EXTRACT_CONCURRENCY: usize = 4;

/// Web search adapter: search → (optional) article extraction → raw records.
pub struct WebSearchProvider {
    name: String,
    query_template: String,
    search: Arc<dyn WebSearch>,
    extractor: Option<Arc<dyn ArticleExtractor>>,
    credibility_hint: Option<f32>,
}

impl WebSearchProvider {
    pub fn new(name: impl Into<String>, search: Arc<dyn WebSearch>) -> Self {
        Self {
            name: name.into(),
            query_template: String::new(),
            search,
            extractor: None,
            credibility_hint: None,
        }
    }

    /// `{topic}` is replaced by the topic; empty means `"<topic>"` (quoted phrase).
    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = template.into();
        self
    }

    pub fn with_extractor(mut self, extractor: Option<Arc<dyn ArticleExtractor>>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_credibility(mut self, hint: Option<f32>) -> Self {
        self.credibility_hint = hint;
        self
    }

    fn record_from_hit(hit: SearchHit) -> RawRecord {
        RawRecord {
            url: Some(hit.url),
            title: Some(hit.title),
            content: None,
            description: Some(hit.snippet),
            ..Default::default()
        }
    }

    /// Expand a hit into the full article. Extraction failures skip just this hit.
    async fn expand(extractor: &dyn ArticleExtractor, hit: SearchHit) -> Option<RawRecord> {
        match extractor.extract(&hit.url).await {
            Ok(article) => {
                let title = if article.title.trim().is_empty() {
                    hit.title
                } else {
                    article.title
                };
                Some(RawRecord {
                    url: Some(hit.url),
                    title: Some(title),
                    content: Some(article.text),
                    description: Some(hit.snippet),
                    published_at: article.published_at,
                    ..Default::default()
                })
            }
            Err(e) => {
                tracing::debug!(error = ?e, url = %hit.url, "article extraction failed");
                None
            }
        }
    }
}

#[async_trait]
impl SourceProvider for WebSearchProvider {
    async fn fetch(&self, query: &Query) -> Result<Vec<RawRecord>> {
        let q = expand_query_template(&self.query_template, &query.topic);
        let hits = self
            .search
            .search(&q, query.limit.saturating_add(HIT_HEADROOM))
            .await
            .context("web search")?;

        let hits: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| !h.url.trim().is_empty())
            .collect();

        let mut out: Vec<RawRecord> = match &self.extractor {
            Some(ex) => stream::iter(hits.into_iter().map(|h| Self::expand(ex.as_ref(), h)))
                .buffered(EXTRACT_CONCURRENCY)
                .filter_map(|rec| async move { rec })
                .collect()
                .await,
            None => hits.into_iter().map(Self::record_from_hit).collect(),
        };
        out.truncate(query.limit);

        counter!("research_records_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> SourceStrategy {
        SourceStrategy::WebSearch
    }

    fn credibility_hint(&self) -> Option<f32> {
        self.credibility_hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Article;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSearch {
        seen: Mutex<Vec<(String, usize)>>,
        n: usize,
    }

    #[async_trait]
    impl WebSearch for FakeSearch {
        async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
            self.seen.lock().unwrap().push((query.to_string(), max_results));
            Ok((0..self.n.min(max_results))
                .map(|i| SearchHit {
                    url: format!("https://site{i}.com/a"),
                    title: format!("Hit {i}"),
                    snippet: format!("snippet {i}"),
                })
                .collect())
        }
    }

    struct OddExtractor;

    #[async_trait]
    impl ArticleExtractor for OddExtractor {
        async fn extract(&self, url: &str) -> Result<Article> {
            let i: usize = url
                .trim_start_matches("https://site")
                .trim_end_matches(".com/a")
                .parse()?;
            if i % 2 == 1 {
                anyhow::bail!("paywall");
            }
            Ok(Article {
                title: String::new(),
                text: format!("full text {i}"),
                published_at: None,
            })
        }
    }

    #[tokio::test]
    async fn snippets_become_records_without_extractor() {
        let search = Arc::new(FakeSearch {
            seen: Mutex::new(vec![]),
            n: 20,
        });
        let p = WebSearchProvider::new("ddg", search.clone());
        let recs = p.fetch(&Query::new("quantum computing", 3)).await.unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].description.as_deref(), Some("snippet 0"));
        let seen = search.seen.lock().unwrap();
        assert_eq!(seen[0], ("\"quantum computing\"".to_string(), 8));
    }

    #[tokio::test]
    async fn extraction_failures_skip_single_hits() {
        let search = Arc::new(FakeSearch {
            seen: Mutex::new(vec![]),
            n: 6,
        });
        let p = WebSearchProvider::new("ddg", search)
            .with_query_template("{topic} news")
            .with_extractor(Some(Arc::new(OddExtractor)));
        let recs = p.fetch(&Query::new("x", 10)).await.unwrap();
        assert_eq!(recs.len(), 3);
        assert!(recs.iter().all(|r| r.content.as_deref().unwrap().starts_with("full text")));
        // Blank article title falls back to the hit title
        assert_eq!(recs[0].title.as_deref(), Some("Hit 0"));
    }

    #[tokio::test]
    async fn huge_limit_saturates_instead_of_overflowing() {
        let search = Arc::new(FakeSearch {
            seen: Mutex::new(vec![]),
            n: 4,
        });
        let p = WebSearchProvider::new("ddg", search.clone());
        let recs = p.fetch(&Query::new("x", usize::MAX)).await.unwrap();
        assert_eq!(recs.len(), 4);
        assert_eq!(search.seen.lock().unwrap()[0].1, usize::MAX);
    }

    #[derive(Default)]
    struct CountingExtractor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ArticleExtractor for CountingExtractor {
        async fn extract(&self, url: &str) -> Result<Article> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Article {
                title: String::new(),
                text: format!("body of {url}"),
                published_at: None,
            })
        }
    }

    #[tokio::test]
    async fn extraction_is_bounded_and_keeps_hit_order() {
        let search = Arc::new(FakeSearch {
            seen: Mutex::new(vec![]),
            n: 20,
        });
        let ex = Arc::new(CountingExtractor::default());
        let extractor: Arc<dyn ArticleExtractor> = ex.clone();
        let p = WebSearchProvider::new("ddg", search).with_extractor(Some(extractor));
        let recs = p.fetch(&Query::new("x", 15)).await.unwrap();
        assert_eq!(recs.len(), 15);
        assert_eq!(recs[0].url.as_deref(), Some("https://site0.com/a"));
        assert_eq!(recs[14].url.as_deref(), Some("https://site14.com/a"));
        let peak = ex.peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= EXTRACT_CONCURRENCY, "peak {peak}");
    }
}

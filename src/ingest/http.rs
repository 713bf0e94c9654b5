// src/ingest/http.rs
//! reqwest-backed collaborators: feed transport, DuckDuckGo HTML search,
//! article extraction and the Semantic Scholar paper index.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::ingest::clean_markup;
use crate::ingest::providers::feed::parse_feed_date;
use crate::ingest::providers::Collaborators;
use crate::ingest::types::{
    Article, ArticleExtractor, FeedFetcher, Paper, PaperSearch, SearchHit, WebSearch,
};

const USER_AGENT: &str = "topic-research/0.1 (+https://github.com/topic-research)";
const SEMANTIC_SCHOLAR_SEARCH: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
const DDG_HTML: &str = "https://html.duckduckgo.com/html/";

/// Article bodies shorter than this are treated as teasers or paywalls.
pub const MIN_ARTICLE_WORDS: usize = 100;

/// Shared client: UA, connect + total timeouts.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("building reqwest client")
}

/// Every network-backed collaborator over one shared client. No semantic model.
pub fn http_collaborators(timeout: Duration) -> Result<Collaborators> {
    let client = build_client(timeout)?;
    Ok(Collaborators::default()
        .with_web_search(Arc::new(DuckDuckGoSearch::new(client.clone())))
        .with_extractor(Arc::new(HttpArticleExtractor::new(client.clone())))
        .with_papers(Arc::new(SemanticScholarClient::new(client.clone())))
        .with_feeds(Arc::new(HttpFetcher::new(client))))
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?
        .text()
        .await
        .with_context(|| format!("reading body of {url}"))
}

/* ----------------------------
Feeds
---------------------------- */

/// Plain GET feed transport.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<String> {
        get_text(&self.client, url).await
    }
}

/* ----------------------------
DuckDuckGo
---------------------------- */

/// DuckDuckGo HTML endpoint (no JavaScript, no API key).
#[derive(Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        tracing::trace!(max_results, "duckduckgo search");
        let html = self
            .client
            .post(DDG_HTML)
            .form(&[("q", query), ("kl", "wt-wt")])
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .context("duckduckgo request")?
            .error_for_status()
            .context("duckduckgo status")?
            .text()
            .await
            .context("duckduckgo body")?;
        parse_duckduckgo_html(&html, max_results)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{css}`: {e:?}"))
}

/// DDG wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`; unwrap those.
fn unwrap_ddg_redirect(href: &str) -> Option<String> {
    let full = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&full).ok()?;
    if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
    } else {
        Some(full)
    }
}

/// Result blocks → hits (ads skipped), at most `max_results`.
pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let doc = Html::parse_document(html);
    let result_sel = selector(".result:not(.result--ad), .web-result:not(.result--ad)")?;
    let title_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for el in doc.select(&result_sel) {
        let Some(a) = el.select(&title_sel).next() else {
            continue;
        };
        let title = a.text().collect::<String>().trim().to_string();
        let Some(url) = a.value().attr("href").and_then(unwrap_ddg_redirect) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let snippet = el
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        hits.push(SearchHit {
            url,
            title,
            snippet,
        });
        if hits.len() >= max_results {
            break;
        }
    }
    Ok(hits)
}

/* ----------------------------
Articles
---------------------------- */

/// Downloads a page and pulls title, publish date and paragraph text.
#[derive(Clone)]
pub struct HttpArticleExtractor {
    client: reqwest::Client,
}

impl HttpArticleExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArticleExtractor for HttpArticleExtractor {
    async fn extract(&self, url: &str) -> Result<Article> {
        let html = get_text(&self.client, url).await?;
        parse_article_html(&html)
    }
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css).ok()?;
    doc.select(&sel)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Title: `og:title`, else `<title>`. Date: `article:published_time`, else the
/// first `<time datetime>`. Text: `<p>` inside `<article>` when present, else all `<p>`.
pub fn parse_article_html(html: &str) -> Result<Article> {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#)
        .or_else(|| {
            let sel = selector("title").ok()?;
            doc.select(&sel)
                .next()
                .map(|t| t.text().collect::<String>())
        })
        .map(|t| clean_markup(&t))
        .unwrap_or_default();

    let published_at = meta_content(
        &doc,
        r#"meta[property="article:published_time"], meta[name="pubdate"], meta[itemprop="datePublished"]"#,
    )
    .or_else(|| {
        let sel = selector("time[datetime]").ok()?;
        doc.select(&sel)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(str::to_string)
    })
    .and_then(|d| parse_feed_date(&d));

    let in_article = selector("article p")?;
    let any_p = selector("p")?;
    let mut paragraphs: Vec<String> = doc
        .select(&in_article)
        .map(|p| p.text().collect::<String>())
        .collect();
    if paragraphs.is_empty() {
        paragraphs = doc
            .select(&any_p)
            .map(|p| p.text().collect::<String>())
            .collect();
    }
    let text = clean_markup(&paragraphs.join("\n"));

    let words = text.split_whitespace().count();
    if title.is_empty() || words < MIN_ARTICLE_WORDS {
        bail!("no usable article body ({words} words)");
    }

    Ok(Article {
        title,
        text,
        published_at,
    })
}

/* ----------------------------
Semantic Scholar
---------------------------- */

/// Graph API paper search (unauthenticated tier).
#[derive(Clone)]
pub struct SemanticScholarClient {
    client: reqwest::Client,
    endpoint: String,
}

impl SemanticScholarClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: SEMANTIC_SCHOLAR_SEARCH.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct S2Response {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

fn s2_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Decode a `/paper/search` response body.
pub fn papers_from_json(body: &str) -> Result<Vec<Paper>> {
    let resp: S2Response = serde_json::from_str(body).context("semantic scholar json")?;
    Ok(resp
        .data
        .into_iter()
        .map(|p| {
            let url = p.url.or_else(|| {
                p.paper_id
                    .map(|id| format!("https://www.semanticscholar.org/paper/{id}"))
            });
            Paper {
                url,
                title: p.title,
                abstract_text: p.abstract_text,
                published_at: p.publication_date.as_deref().and_then(s2_date),
                authors: p.authors.into_iter().filter_map(|a| a.name).collect(),
            }
        })
        .collect())
}

#[async_trait]
impl PaperSearch for SemanticScholarClient {
    async fn search_papers(&self, query: &str, limit: usize) -> Result<Vec<Paper>> {
        let limit = limit.clamp(1, 100).to_string();
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("query", query),
                ("limit", limit.as_str()),
                ("fields", "title,url,abstract,publicationDate,authors"),
            ])
            .send()
            .await
            .context("semantic scholar request")?
            .error_for_status()
            .context("semantic scholar status")?
            .text()
            .await
            .context("semantic scholar body")?;
        papers_from_json(&body)
    }
}

// src/ingest/providers/feed.rs
//! RSS 2.0 / RDF / Atom feed adapter.
//!
//! Parsing is event-based (quick-xml `Reader`) and keyed on local element names,
//! so `dc:creator`, `content:encoded` and default-namespaced Atom documents all
//! land in the same fields. Item and entry vocabularies are folded together:
//!
//! | field       | RSS                          | Atom                         |
//! |-------------|------------------------------|------------------------------|
//! | link        | `<link>` text                | `<link rel="alternate" href>`|
//! | description | `<description>`              | `<summary>`                  |
//! | content     | `<content:encoded>`          | `<content>`                  |
//! | published   | `<pubDate>` / `<dc:date>`    | `<published>` / `<updated>`  |
//! | author      | `<author>` / `<dc:creator>`  | `<author><name>`             |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::candidate::SourceStrategy;
use crate::ingest::matches_keywords;
use crate::ingest::types::{FeedFetcher, Query, RawRecord, SourceProvider};

/// Entry as found in the document, before any filtering.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub author: String,
    pub category: Option<String>,
}

impl FeedEntry {
    fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published
            .as_deref()
            .and_then(parse_feed_date)
            .or_else(|| self.updated.as_deref().and_then(parse_feed_date))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

/// Parse a feed date: RFC 2822, RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`.
/// Anything else yields `None`; the recency scorer treats that as undated.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let odt = OffsetDateTime::parse(&fix_obsolete_zone(s), &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(
                s,
                format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
            )
            .ok()
            .map(PrimitiveDateTime::assume_utc)
        })
        .or_else(|| {
            Date::parse(s, format_description!("[year]-[month]-[day]"))
                .ok()
                .map(|d| d.midnight().assume_utc())
        })?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

// RFC 2822 obsolete zones seen in the wild ("GMT", "UT", "Z").
fn fix_obsolete_zone(s: &str) -> String {
    for zone in [" GMT", " UTC", " UT", " Z"] {
        if let Some(head) = s.strip_suffix(zone) {
            return format!("{head} +0000");
        }
    }
    s.to_string()
}

/// HTML entities that are legal in HTML but not in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

fn attr(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn push_text(slot: &mut String, text: &str) {
    let t = text.trim();
    if t.is_empty() {
        return;
    }
    if !slot.is_empty() {
        slot.push(' ');
    }
    slot.push_str(t);
}

/// Parse an RSS/RDF/Atom document into entries (document order).
pub fn parse_feed(xml: &str) -> Result<(FeedFormat, Vec<FeedEntry>)> {
    let xml = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut format: Option<FeedFormat> = None;
    let mut entries = Vec::new();
    // Local element names from the document root down to the current element.
    let mut stack: Vec<String> = Vec::new();
    // Depth of the open item/entry in `stack`, if any.
    let mut entry_depth: Option<usize> = None;
    let mut cur = FeedEntry::default();
    let mut alt_link: Option<String> = None;
    let mut other_link: Option<String> = None;

    loop {
        let ev = reader
            .read_event()
            .with_context(|| format!("xml error at byte {}", reader.buffer_position()))?;
        match ev {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(ev, Event::Empty(_));
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if format.is_none() && stack.is_empty() {
                    format = match local.as_str() {
                        "rss" | "RDF" => Some(FeedFormat::Rss),
                        "feed" => Some(FeedFormat::Atom),
                        other => bail!("document root <{other}> is neither RSS nor Atom"),
                    };
                }

                if entry_depth.is_none() && (local == "item" || local == "entry") {
                    if !is_empty {
                        entry_depth = Some(stack.len());
                        cur = FeedEntry::default();
                        alt_link = None;
                        other_link = None;
                        stack.push(local);
                    }
                    continue;
                }

                if let Some(d) = entry_depth {
                    // Direct children of the entry carry attributes we care about.
                    if stack.len() == d + 1 {
                        match local.as_str() {
                            "link" => {
                                if let Some(href) = attr(e, "href") {
                                    match attr(e, "rel").as_deref() {
                                        None | Some("alternate") => {
                                            alt_link.get_or_insert(href);
                                        }
                                        _ => {
                                            other_link.get_or_insert(href);
                                        }
                                    }
                                }
                            }
                            "category" => {
                                if cur.category.is_none() {
                                    cur.category = attr(e, "term");
                                }
                            }
                            _ => {}
                        }
                    }
                }

                if !is_empty {
                    stack.push(local);
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                if let Some(d) = entry_depth {
                    assign_text(&mut cur, &stack, d, &text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(d) = entry_depth {
                    assign_text(&mut cur, &stack, d, &text);
                }
            }
            Event::End(_) => {
                stack.pop();
                if entry_depth == Some(stack.len()) {
                    entry_depth = None;
                    if cur.link.is_empty() {
                        if let Some(l) = alt_link.take().or_else(|| other_link.take()) {
                            cur.link = l;
                        }
                    }
                    entries.push(std::mem::take(&mut cur));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match format {
        Some(f) => Ok((f, entries)),
        None => bail!("empty feed document"),
    }
}

/// Route text of a descendant of the current entry into the matching field.
fn assign_text(cur: &mut FeedEntry, stack: &[String], entry_depth: usize, text: &str) {
    let Some(field) = stack.get(entry_depth + 1) else {
        return;
    };
    let leaf = stack.last().map(String::as_str).unwrap_or_default();
    match field.as_str() {
        "title" => push_text(&mut cur.title, text),
        "link" => push_text(&mut cur.link, text),
        "description" | "summary" => push_text(&mut cur.description, text),
        "encoded" | "content" => push_text(&mut cur.content, text),
        "pubDate" | "published" | "date" | "issued" => {
            cur.published.get_or_insert_with(|| text.trim().to_string());
        }
        "updated" | "modified" => {
            cur.updated.get_or_insert_with(|| text.trim().to_string());
        }
        "author" | "creator" => {
            // Atom nests <name>/<email>; keep only the name.
            if field == "creator" || leaf == "author" || leaf == "name" {
                if cur.author.is_empty() {
                    push_text(&mut cur.author, text);
                }
            }
        }
        "category" | "subject" => {
            if cur.category.is_none() && !text.trim().is_empty() {
                cur.category = Some(text.trim().to_string());
            }
        }
        _ => {}
    }
}

/// In-memory feed transport (fixtures, demos).
pub struct StaticFeed {
    body: String,
}

impl StaticFeed {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl FeedFetcher for StaticFeed {
    async fn fetch_feed(&self, _url: &str) -> Result<String> {
        Ok(self.body.clone())
    }
}

/// Feed adapter: transport + parse + keyword filter.
pub struct FeedProvider {
    name: String,
    url: String,
    fetcher: Arc<dyn FeedFetcher>,
    keywords: Vec<String>,
    category: Option<String>,
    credibility_hint: Option<f32>,
}

impl FeedProvider {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fetcher,
            keywords: Vec::new(),
            category: None,
            credibility_hint: None,
        }
    }

    /// Provider backed by a fixed document instead of HTTP.
    pub fn from_fixture_str(name: &str, url: &str, xml: &str) -> Self {
        Self::new(name, url, Arc::new(StaticFeed::new(xml)))
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_credibility(mut self, hint: Option<f32>) -> Self {
        self.credibility_hint = hint;
        self
    }

    /// Parse a body and apply the keyword filter. At most `2 * limit` entries are
    /// examined and at most `limit` kept.
    pub fn records_from_str(&self, xml: &str, limit: usize) -> Result<Vec<RawRecord>> {
        let t0 = std::time::Instant::now();
        let (_format, entries) =
            parse_feed(xml).with_context(|| format!("parsing feed {}", self.name))?;

        let mut out = Vec::with_capacity(limit.min(entries.len()));
        for entry in entries.into_iter().take(limit.saturating_mul(2)) {
            if out.len() >= limit {
                break;
            }
            if entry.title.trim().is_empty() || entry.link.trim().is_empty() {
                continue;
            }
            let haystack = format!("{} {}", entry.title, entry.description);
            if !matches_keywords(&haystack, &self.keywords) {
                continue;
            }
            let published_at = entry.published_at();
            out.push(RawRecord {
                url: Some(entry.link.trim().to_string()),
                title: Some(entry.title),
                content: Some(entry.content).filter(|c| !c.trim().is_empty()),
                description: Some(entry.description).filter(|d| !d.trim().is_empty()),
                published_at,
                author: Some(entry.author).filter(|a| !a.trim().is_empty()),
                category: self.category.clone().or(entry.category),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("research_feed_parse_ms").record(ms);
        counter!("research_records_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch(&self, query: &Query) -> Result<Vec<RawRecord>> {
        let body = self
            .fetcher
            .fetch_feed(&self.url)
            .await
            .with_context(|| format!("fetching feed {}", self.url))?;
        self.records_from_str(&body, query.limit)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> SourceStrategy {
        SourceStrategy::Feed
    }

    fn credibility_hint(&self) -> Option<f32> {
        self.credibility_hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Test</title>
    <item>
      <title>Solar power &amp; storage</title>
      <link>https://example.com/solar</link>
      <description><![CDATA[<p>Grid storage&nbsp;news</p>]]></description>
      <content:encoded><![CDATA[<p>Full body about solar</p>]]></content:encoded>
      <pubDate>Tue, 10 Sep 2024 08:00:00 GMT</pubDate>
      <dc:creator>Jane Roe</dc:creator>
      <category>Energy</category>
      <category>Tech</category>
    </item>
    <item>
      <title>No link here</title>
    </item>
    <item>
      <title>Football results</title>
      <link>https://example.com/football</link>
      <description>Scores</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom test</title>
  <entry>
    <title type="html">Wind turbines</title>
    <link rel="self" href="https://example.org/self/1"/>
    <link rel="alternate" href="https://example.org/wind"/>
    <summary>Offshore wind capacity grows</summary>
    <updated>2024-09-11T10:30:00Z</updated>
    <author><name>John Doe</name><email>jd@example.org</email></author>
    <category term="energy"/>
  </entry>
</feed>"#;

    #[test]
    fn parses_rss_items_with_namespaces() {
        let (fmt, items) = parse_feed(RSS).unwrap();
        assert_eq!(fmt, FeedFormat::Rss);
        assert_eq!(items.len(), 3);
        let first = &items[0];
        assert_eq!(first.title, "Solar power & storage");
        assert_eq!(first.link, "https://example.com/solar");
        assert!(first.description.contains("Grid storage"));
        assert!(first.content.contains("Full body"));
        assert_eq!(first.author, "Jane Roe");
        assert_eq!(first.category.as_deref(), Some("Energy"));
        let dt = first.published_at().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 9, 10, 8));
    }

    #[test]
    fn parses_atom_entries_prefers_alternate_link() {
        let (fmt, items) = parse_feed(ATOM).unwrap();
        assert_eq!(fmt, FeedFormat::Atom);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.org/wind");
        assert_eq!(items[0].author, "John Doe");
        assert_eq!(items[0].category.as_deref(), Some("energy"));
        assert!(items[0].published_at().is_some());
    }

    #[test]
    fn rejects_non_feed_documents() {
        assert!(parse_feed("<html><body>nope</body></html>").is_err());
        assert!(parse_feed("").is_err());
        assert!(parse_feed("<rss><channel><item><title>x</title></channel></rss>").is_err());
    }

    #[test]
    fn date_formats() {
        assert!(parse_feed_date("Tue, 10 Sep 2024 08:00:00 +0000").is_some());
        assert!(parse_feed_date("Tue, 10 Sep 2024 08:00:00 GMT").is_some());
        assert!(parse_feed_date("2024-09-10T08:00:00+02:00").is_some());
        assert!(parse_feed_date("2024-09-10 08:00:00").is_some());
        assert!(parse_feed_date("2024-09-10").is_some());
        assert!(parse_feed_date("yesterday").is_none());
        assert!(parse_feed_date("").is_none());
    }

    #[test]
    fn keyword_filter_and_missing_links() {
        let p = FeedProvider::from_fixture_str("t", "https://example.com/rss", RSS)
            .with_keywords(vec!["solar".into()]);
        let recs = p.records_from_str(RSS, 10).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].url.as_deref(), Some("https://example.com/solar"));
        assert_eq!(recs[0].author.as_deref(), Some("Jane Roe"));

        let all = FeedProvider::from_fixture_str("t", "https://example.com/rss", RSS);
        let recs = all.records_from_str(RSS, 10).unwrap();
        assert_eq!(recs.len(), 2, "item without link is skipped");
        let one = all.records_from_str(RSS, 1).unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn fixture_provider_fetches() {
        let p = FeedProvider::from_fixture_str("Atom", "https://example.org/feed", ATOM)
            .with_category(Some("science".into()));
        let recs = p.fetch(&Query::new("wind", 5)).await.unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].category.as_deref(), Some("science"));
        assert_eq!(p.strategy(), SourceStrategy::Feed);
    }
}

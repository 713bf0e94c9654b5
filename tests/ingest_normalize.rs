// tests/ingest_normalize.rs
use topic_research::error::Rejection;
use topic_research::ingest::types::RawRecord;
use topic_research::ingest::{clean_markup, normalize, normalize_record, NormalizeLimits};
use topic_research::SourceStrategy;

fn raw(url: Option<&str>, title: Option<&str>, description: Option<&str>) -> RawRecord {
    RawRecord {
        url: url.map(Into::into),
        title: title.map(Into::into),
        description: description.map(Into::into),
        ..Default::default()
    }
}

fn norm(r: &RawRecord) -> Result<topic_research::Candidate, Rejection> {
    normalize_record(r, SourceStrategy::WebSearch, "ddg", &NormalizeLimits::default())
}

const BODY: &str = "A description long enough to pass the minimum content check.";

#[test]
fn missing_or_blank_url_is_rejected() {
    assert_eq!(norm(&raw(None, Some("T"), Some(BODY))), Err(Rejection::MissingUrl));
    assert_eq!(norm(&raw(Some("   "), Some("T"), Some(BODY))), Err(Rejection::MissingUrl));
}

#[test]
fn non_http_url_is_rejected() {
    assert_eq!(
        norm(&raw(Some("ftp://example.com/x"), Some("T"), Some(BODY))),
        Err(Rejection::InvalidUrl)
    );
    assert_eq!(
        norm(&raw(Some("not a url"), Some("T"), Some(BODY))),
        Err(Rejection::InvalidUrl)
    );
}

#[test]
fn title_that_is_only_markup_is_rejected() {
    assert_eq!(
        norm(&raw(Some("https://example.com/a"), Some("<b> </b>"), Some(BODY))),
        Err(Rejection::MissingTitle)
    );
}

#[test]
fn short_content_is_rejected_with_length() {
    let r = norm(&raw(Some("https://example.com/a"), Some("Title"), Some("<p>tiny</p>")));
    assert_eq!(r, Err(Rejection::ContentTooShort { chars: 4 }));
    assert!(normalize(
        &raw(Some("https://example.com/a"), Some("Title"), None),
        SourceStrategy::Feed,
        "f",
        &NormalizeLimits::default()
    )
    .is_none());
}

#[test]
fn content_and_snippet_are_bounded() {
    let long = "word ".repeat(1_000);
    let r = RawRecord {
        url: Some("https://Example.com/a".into()),
        title: Some("  Long   <i>read</i> ".into()),
        content: Some(long.clone()),
        ..Default::default()
    };
    let limits = NormalizeLimits {
        min_content_chars: 20,
        content_max_chars: 100,
        snippet_max_chars: 30,
    };
    let c = normalize_record(&r, SourceStrategy::Feed, "f", &limits).unwrap();
    assert_eq!(c.title, "Long read");
    assert_eq!(c.domain, "example.com");
    assert!(c.content.chars().count() <= 100);
    assert!(c.snippet.chars().count() <= 30);
    // Word count is measured before truncation.
    assert_eq!(c.word_count, 1_000);
}

#[test]
fn clean_markup_folds_quotes_and_whitespace() {
    let s = "<p>\u{201C}Quoted\u{201D}\u{00A0}and\n\t<em>spaced</em></p>";
    assert_eq!(clean_markup(s), "\"Quoted\" and spaced");
}

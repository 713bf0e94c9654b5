// src/analyze/url_normalize.rs
//! Canonical URL form for duplicate detection.

use url::Url;

/// Query parameters that only track the visitor.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
    "ref",
    "cmpid",
];

/// Canonicalize a URL:
/// lowercased scheme/host, default port dropped, fragment dropped,
/// tracking params stripped, remaining params sorted, trailing slash removed.
///
/// Unparseable input comes back trimmed and otherwise unchanged.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);
    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_ascii_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    let mut out = parsed.to_string();
    // Root path serializes as "https://host/"; fold it onto "https://host".
    if parsed.path() == "/" && parsed.query().is_none() && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Dedup key: the canonical URL, case-folded entirely (paths included).
pub fn url_key(raw: &str) -> String {
    normalize_url(raw).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casing_and_trailing_slash_collapse() {
        assert_eq!(
            url_key("HTTPS://Example.COM/News/Story/"),
            url_key("https://example.com/news/story")
        );
        assert_eq!(url_key("https://example.com/"), url_key("https://example.com"));
    }

    #[test]
    fn keeps_path_case_in_canonical_form() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/Path/"),
            "https://example.com/Path"
        );
    }

    #[test]
    fn strips_tracking_fragment_and_default_port() {
        assert_eq!(
            normalize_url("https://example.com:443/a?utm_source=x&b=2&a=1#top"),
            "https://example.com/a?a=1&b=2"
        );
        assert_eq!(
            normalize_url("http://example.com:80/a?fbclid=abc"),
            "http://example.com/a"
        );
    }

    #[test]
    fn non_urls_pass_through() {
        assert_eq!(normalize_url("  not a url "), "not a url");
    }
}

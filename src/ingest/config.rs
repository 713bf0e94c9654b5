// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::candidate::SourceStrategy;
use crate::error::ResearchError;

const ENV_PATH: &str = "RESEARCH_PROVIDERS_PATH";

/// Caller-supplied description of one provider to query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: SourceStrategy,
    /// Feed URL for feeds; query template (`{topic}` placeholder) for search kinds.
    #[serde(default, alias = "endpoint", alias = "url", alias = "query")]
    pub endpoint_or_query: String,
    #[serde(default, alias = "credibility")]
    pub credibility_hint: Option<f32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

// The original feed lists carried no kind; treat them as feeds.
fn default_kind() -> SourceStrategy {
    SourceStrategy::Feed
}

impl ProviderSpec {
    pub fn new(
        name: impl Into<String>,
        kind: SourceStrategy,
        endpoint_or_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint_or_query: endpoint_or_query.into(),
            credibility_hint: None,
            category: None,
            keywords: Vec::new(),
        }
    }

    pub fn with_credibility(mut self, hint: f32) -> Self {
        self.credibility_hint = Some(hint);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Search string for search-kind providers.
    pub fn search_query(&self, topic: &str) -> String {
        expand_query_template(&self.endpoint_or_query, topic)
    }
}

/// `{topic}` substitution. An empty template means the quoted topic phrase.
pub fn expand_query_template(template: &str, topic: &str) -> String {
    let tpl = template.trim();
    if tpl.is_empty() {
        format!("\"{}\"", topic.trim())
    } else {
        tpl.replace("{topic}", topic.trim())
    }
}

/// Reject malformed provider lists before any fetch happens.
pub fn validate_specs(specs: &[ProviderSpec]) -> Result<(), ResearchError> {
    if specs.is_empty() {
        return Err(ResearchError::InvalidInput(
            "at least one provider must be configured".into(),
        ));
    }
    let mut names = HashSet::new();
    for s in specs {
        let name = s.name.trim();
        if name.is_empty() {
            return Err(ResearchError::InvalidInput("provider name must not be empty".into()));
        }
        if !names.insert(name.to_ascii_lowercase()) {
            return Err(ResearchError::InvalidInput(format!(
                "duplicate provider name `{name}`"
            )));
        }
        if let Some(h) = s.credibility_hint {
            if !h.is_finite() || !(0.0..=5.0).contains(&h) {
                return Err(ResearchError::InvalidInput(format!(
                    "provider `{name}`: credibility hint {h} outside 0..=5"
                )));
            }
        }
        if s.kind == SourceStrategy::Feed && crate::ingest::domain_of(&s.endpoint_or_query).is_none() {
            return Err(ResearchError::InvalidInput(format!(
                "provider `{name}`: feed endpoint is not an http(s) url"
            )));
        }
    }
    Ok(())
}

/// Load provider specs from an explicit path. Supports TOML or JSON formats.
pub fn load_providers_from(path: &Path) -> Result<Vec<ProviderSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading providers from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_providers(&content, ext.as_str())
}

/// Load provider specs using env var + fallbacks:
/// 1) $RESEARCH_PROVIDERS_PATH
/// 2) config/providers.toml
/// 3) config/providers.json
pub fn load_providers_default() -> Result<Vec<ProviderSpec>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_providers_from(&pb);
        } else {
            return Err(anyhow!("RESEARCH_PROVIDERS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/providers.toml");
    if toml_p.exists() {
        return load_providers_from(&toml_p);
    }
    let json_p = PathBuf::from("config/providers.json");
    if json_p.exists() {
        return load_providers_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_providers(s: &str, hint_ext: &str) -> Result<Vec<ProviderSpec>> {
    let try_toml = hint_ext == "toml" || s.contains("[[providers]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported providers format"))
}

fn parse_toml(s: &str) -> Result<Vec<ProviderSpec>> {
    #[derive(Deserialize)]
    struct TomlProviders {
        #[serde(default)]
        providers: Vec<ProviderSpec>,
    }
    let v: TomlProviders = toml::from_str(s)?;
    Ok(clean_list(v.providers))
}

fn parse_json(s: &str) -> Result<Vec<ProviderSpec>> {
    // Bare array, or the original `{ "feeds": [...] }` shape.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonProviders {
        List(Vec<ProviderSpec>),
        Feeds { feeds: Vec<ProviderSpec> },
        Providers { providers: Vec<ProviderSpec> },
    }
    let v: JsonProviders = serde_json::from_str(s)?;
    let list = match v {
        JsonProviders::List(l) => l,
        JsonProviders::Feeds { feeds } => feeds,
        JsonProviders::Providers { providers } => providers,
    };
    Ok(clean_list(list))
}

fn clean_list(items: Vec<ProviderSpec>) -> Vec<ProviderSpec> {
    items
        .into_iter()
        .map(|mut p| {
            p.name = p.name.trim().to_string();
            p.endpoint_or_query = p.endpoint_or_query.trim().to_string();
            p.keywords.retain(|k| !k.trim().is_empty());
            p
        })
        .collect()
}

// src/config/research.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

// --- env defaults & names ---
pub const DEFAULT_RESEARCH_CONFIG_PATH: &str = "config/research.toml";
pub const ENV_RESEARCH_CONFIG_PATH: &str = "RESEARCH_CONFIG_PATH";
pub const ENV_SEMANTIC_THRESHOLD: &str = "RESEARCH_SEMANTIC_THRESHOLD";
pub const ENV_LEXICAL_THRESHOLD: &str = "RESEARCH_LEXICAL_THRESHOLD";

/// Composite weight of the relevance sub-score.
pub const WEIGHT_RELEVANCE: f32 = 0.5;
/// Composite weight of the recency sub-score.
pub const WEIGHT_RECENCY: f32 = 0.3;
/// Composite weight of the (normalized) credibility sub-score.
pub const WEIGHT_CREDIBILITY: f32 = 0.2;

/// Minimum relevance when a semantic similarity model is active.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.55;
/// Minimum relevance for the lexical fallback heuristic.
pub const DEFAULT_LEXICAL_THRESHOLD: f32 = 0.35;

fn default_semantic_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}
fn default_lexical_threshold() -> f32 {
    DEFAULT_LEXICAL_THRESHOLD
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_min_content_chars() -> usize {
    20
}
fn default_content_max_chars() -> usize {
    2000
}
fn default_snippet_max_chars() -> usize {
    400
}
fn default_title_prefix_len() -> usize {
    60
}
fn default_per_provider_limit() -> usize {
    10
}
fn default_credibility_path() -> PathBuf {
    PathBuf::from("config/credibility.json")
}

/// Composite score weights. Fixed policy by default, overridable via `[weights]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_w_relevance")]
    pub relevance: f32,
    #[serde(default = "default_w_recency")]
    pub recency: f32,
    #[serde(default = "default_w_credibility")]
    pub credibility: f32,
}

fn default_w_relevance() -> f32 {
    WEIGHT_RELEVANCE
}
fn default_w_recency() -> f32 {
    WEIGHT_RECENCY
}
fn default_w_credibility() -> f32 {
    WEIGHT_CREDIBILITY
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            relevance: WEIGHT_RELEVANCE,
            recency: WEIGHT_RECENCY,
            credibility: WEIGHT_CREDIBILITY,
        }
    }
}

impl ScoreWeights {
    fn is_valid(&self) -> bool {
        [self.relevance, self.recency, self.credibility]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
            && (self.relevance + self.recency + self.credibility) > 0.0
    }
}

/// Tunables of one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
    #[serde(default = "default_lexical_threshold")]
    pub lexical_threshold: f32,
    /// Per-provider fetch timeout.
    #[serde(default = "default_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Records each provider is asked for.
    #[serde(default = "default_per_provider_limit")]
    pub per_provider_limit: usize,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_content_max_chars")]
    pub content_max_chars: usize,
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
    #[serde(default = "default_title_prefix_len")]
    pub title_prefix_len: usize,
    /// Normalized Levenshtein similarity at which two titles count as one story.
    #[serde(default)]
    pub near_duplicate_title: Option<f64>,
    /// Diversity cap: maximum ranked results sharing one domain.
    #[serde(default)]
    pub max_per_domain: Option<usize>,
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default = "default_credibility_path")]
    pub credibility_path: PathBuf,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            lexical_threshold: DEFAULT_LEXICAL_THRESHOLD,
            provider_timeout_secs: default_timeout_secs(),
            per_provider_limit: default_per_provider_limit(),
            min_content_chars: default_min_content_chars(),
            content_max_chars: default_content_max_chars(),
            snippet_max_chars: default_snippet_max_chars(),
            title_prefix_len: default_title_prefix_len(),
            near_duplicate_title: None,
            max_per_domain: None,
            weights: ScoreWeights::default(),
            credibility_path: default_credibility_path(),
        }
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

impl ResearchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }

    /// Parse from a TOML string and sanitize.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ResearchConfig = toml::from_str(s).context("parsing research config")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading research config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config using env var + fallbacks, then apply env threshold overrides:
    /// 1) $RESEARCH_CONFIG_PATH (must exist)
    /// 2) config/research.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_RESEARCH_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("RESEARCH_CONFIG_PATH points to non-existent path");
            }
            Self::load_from(&pb)?
        } else {
            let p = PathBuf::from(DEFAULT_RESEARCH_CONFIG_PATH);
            if p.exists() {
                Self::load_from(&p)?
            } else {
                Self::default()
            }
        };

        if let Some(t) = parse_threshold_env(std::env::var(ENV_SEMANTIC_THRESHOLD).ok()) {
            cfg.semantic_threshold = t;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_LEXICAL_THRESHOLD).ok()) {
            cfg.lexical_threshold = t;
        }
        Ok(cfg)
    }

    /// Clamp out-of-range values back to something usable.
    fn sanitized(mut self) -> Self {
        if !self.semantic_threshold.is_finite() {
            self.semantic_threshold = DEFAULT_SEMANTIC_THRESHOLD;
        }
        if !self.lexical_threshold.is_finite() {
            self.lexical_threshold = DEFAULT_LEXICAL_THRESHOLD;
        }
        self.semantic_threshold = self.semantic_threshold.clamp(0.0, 1.0);
        self.lexical_threshold = self.lexical_threshold.clamp(0.0, 1.0);
        if !self.weights.is_valid() {
            self.weights = ScoreWeights::default();
        }
        if self.snippet_max_chars > self.content_max_chars {
            self.snippet_max_chars = self.content_max_chars;
        }
        if self.title_prefix_len == 0 {
            self.title_prefix_len = default_title_prefix_len();
        }
        if self.per_provider_limit == 0 {
            self.per_provider_limit = default_per_provider_limit();
        }
        self.near_duplicate_title = self
            .near_duplicate_title
            .filter(|t| t.is_finite() && *t > 0.0 && *t <= 1.0);
        self.max_per_domain = self.max_per_domain.filter(|n| *n > 0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn defaults_match_policy_constants() {
        let c = ResearchConfig::default();
        assert_eq!(c.weights, ScoreWeights::default());
        assert!((c.weights.relevance - 0.5).abs() < 1e-6);
        assert!((c.weights.recency - 0.3).abs() < 1e-6);
        assert!((c.weights.credibility - 0.2).abs() < 1e-6);
        assert!((c.semantic_threshold - 0.55).abs() < 1e-6);
        assert_eq!(c.content_max_chars, 2000);
        assert_eq!(c.snippet_max_chars, 400);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ResearchConfig::from_toml_str(
            r#"
lexical_threshold = 0.4
max_per_domain = 2

[weights]
relevance = 0.6
"#,
        )
        .unwrap();
        assert!((c.lexical_threshold - 0.4).abs() < 1e-6);
        assert_eq!(c.max_per_domain, Some(2));
        assert!((c.weights.relevance - 0.6).abs() < 1e-6);
        assert!((c.weights.recency - 0.3).abs() < 1e-6);
        assert_eq!(c.provider_timeout_secs, 15);
    }

    #[test]
    fn sanitizes_bad_values() {
        let c = ResearchConfig::from_toml_str(
            r#"
semantic_threshold = 3.0
snippet_max_chars = 5000
max_per_domain = 0
near_duplicate_title = 1.7

[weights]
relevance = -1.0
"#,
        )
        .unwrap();
        assert!((c.semantic_threshold - 1.0).abs() < 1e-6);
        assert_eq!(c.snippet_max_chars, c.content_max_chars);
        assert_eq!(c.max_per_domain, None);
        assert_eq!(c.near_duplicate_title, None);
        assert_eq!(c.weights, ScoreWeights::default());
    }

    #[test]
    fn threshold_env_parsing_clamps() {
        assert_eq!(parse_threshold_env(Some(" 0.7 ".into())), Some(0.7));
        assert_eq!(parse_threshold_env(Some("9".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some("nope".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_RESEARCH_CONFIG_PATH);
        env::remove_var(ENV_SEMANTIC_THRESHOLD);

        // No files → defaults
        let c = ResearchConfig::load_default().unwrap();
        assert_eq!(c.per_provider_limit, 10);

        // Env path wins, threshold override applies on top
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "per_provider_limit = 4\nsemantic_threshold = 0.6\n").unwrap();
        env::set_var(ENV_RESEARCH_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_SEMANTIC_THRESHOLD, "0.8");
        let c2 = ResearchConfig::load_default().unwrap();
        assert_eq!(c2.per_provider_limit, 4);
        assert!((c2.semantic_threshold - 0.8).abs() < 1e-6);

        // Missing env path is an error
        env::set_var(ENV_RESEARCH_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(ResearchConfig::load_default().is_err());

        env::remove_var(ENV_RESEARCH_CONFIG_PATH);
        env::remove_var(ENV_SEMANTIC_THRESHOLD);
        env::set_current_dir(&old).unwrap();
    }
}

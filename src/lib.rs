// src/lib.rs
// Public library surface for the HTTP entrypoint, the CLI and integration tests.

pub mod api;
pub mod candidate;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod relevance;
pub mod source_weights;

// Fetch side: provider specs, provider implementations, normalization.
pub mod ingest;

// Post-fetch side: scoring, dedup, ranking helpers, key phrases.
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::candidate::{Candidate, ScoredCandidate, SourceStrategy};
pub use crate::config::ResearchConfig;
pub use crate::ingest::config::ProviderSpec;
pub use crate::ingest::providers::Collaborators;
pub use crate::pipeline::{ResearchRequest, ResearchResult, Researcher};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env flag that turns on compact dev logs (`RESEARCH_DEV_LOG=1`).
pub use crate::relevance::ENV_DEV_LOG;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - RESEARCH_DEV_LOG=1
pub fn enable_dev_tracing() {
    if !relevance::dev_logging_enabled() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("topic_research=info,relevance=info,warn"));

    // try_init: a second call (CLI + tests) must not panic.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Config + providers + HTTP collaborators, all from the working directory / env.
pub fn researcher_from_env() -> anyhow::Result<(Researcher, Vec<ProviderSpec>)> {
    let config = ResearchConfig::load_default()?;
    let providers = ingest::config::load_providers_default()?;
    let collaborators = ingest::http::http_collaborators(config.provider_timeout())?;
    Ok((Researcher::new(config, collaborators), providers))
}

//! Topic research service — binary entrypoint.
//! Boots the Axum HTTP server: research routes, shared state, `/metrics`.
//!
//! See `README.md` for the request shape and configuration files.

use shuttle_axum::ShuttleAxum;
use topic_research::metrics::Metrics;
use topic_research::{create_router, enable_dev_tracing, researcher_from_env, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // Picks up RESEARCH_CONFIG_PATH / RESEARCH_PROVIDERS_PATH / thresholds.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let (researcher, providers) = researcher_from_env()
        .map_err(|e| shuttle_runtime::Error::Custom(e.context("loading research setup")))?;
    tracing::info!(providers = providers.len(), "research service starting");

    let state = AppState::new(researcher, providers);
    let mut router = create_router(state);

    // Metrics are optional: a second recorder (e.g. in tests) must not take the service down.
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(router.into())
}

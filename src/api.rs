use std::collections::HashMap;
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::config::ProviderSpec;
use crate::pipeline::{ResearchRequest, ResearchResult, Researcher};

/// Matches the CLI default.
pub const DEFAULT_MAX_SOURCES: usize = 5;
/// Upper bound on `maxSources` accepted over HTTP; larger values are clamped.
pub const MAX_SOURCES_CAP: usize = 50;

#[derive(Clone)]
pub struct AppState {
    researcher: Arc<Researcher>,
    /// Used when a request names no providers.
    providers: Arc<Vec<ProviderSpec>>,
}

impl AppState {
    pub fn new(researcher: Researcher, providers: Vec<ProviderSpec>) -> Self {
        Self {
            researcher: Arc::new(researcher),
            providers: Arc::new(providers),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/research", post(research))
        .route("/debug/providers", get(debug_providers))
        .route("/debug/credibility", get(debug_credibility))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResearchReq {
    topic: String,
    #[serde(default)]
    max_sources: Option<usize>,
    #[serde(default)]
    providers: Option<Vec<ProviderSpec>>,
    #[serde(default)]
    keywords: Vec<String>,
}

async fn research(
    State(state): State<AppState>,
    Json(body): Json<ResearchReq>,
) -> (StatusCode, Json<ResearchResult>) {
    let providers = body
        .providers
        .unwrap_or_else(|| state.providers.as_ref().clone());
    let req = ResearchRequest::new(
        body.topic,
        body.max_sources
            .unwrap_or(DEFAULT_MAX_SOURCES)
            .min(MAX_SOURCES_CAP),
        providers,
    )
    .with_keywords(body.keywords);

    let result = state.researcher.run(&req, chrono::Utc::now()).await;
    let code = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(result))
}

async fn debug_providers(State(state): State<AppState>) -> Json<Vec<ProviderSpec>> {
    Json(state.providers.as_ref().clone())
}

async fn debug_credibility(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> String {
    let d = q.get("domain").cloned().unwrap_or_default();
    let score = state.researcher.credibility().score_for_domain(&d);
    format!("domain='{}' -> credibility={:.2}", d, score)
}

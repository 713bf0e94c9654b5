//! Error taxonomy for a research run.
//!
//! - Provider failures never leave the adapter boundary: they become a
//!   `ProviderStatus` entry (see `pipeline`), never one of these types.
//! - `Rejection` is a validation drop inside the normalizer; counted, not reported.
//! - `ScoreError` drops a single candidate during scoring.
//! - `ResearchError` aborts the run and surfaces as `success = false`.

/// Run-level failure. Only these reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// Caller input (topic, limits, provider list) is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Why the normalizer refused a raw record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("record has no url")]
    MissingUrl,
    #[error("record url is not an http(s) url")]
    InvalidUrl,
    #[error("record has no title")]
    MissingTitle,
    #[error("content too short ({chars} chars)")]
    ContentTooShort { chars: usize },
}

/// Failure while scoring one candidate.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("similarity model failed: {0}")]
    Model(String),
    #[error("non-finite {0} score")]
    NonFinite(&'static str),
}

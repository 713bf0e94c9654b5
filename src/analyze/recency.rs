// src/analyze/recency.rs
//! Linear freshness decay over a 30-day window.

use chrono::{DateTime, Utc};

/// Age (days) at which recency reaches zero.
pub const RECENCY_WINDOW_DAYS: f64 = 30.0;
/// Score for documents without a publication date.
pub const UNDATED_RECENCY: f32 = 0.5;
/// Items younger than this count as published today.
const FRESH_DAYS: f64 = 1.0;

/// 1.0 for anything under a day old (or future-dated), `1 - age_days/30` in
/// between, 0.0 from 30 days on, 0.5 when undated. `now` is injected so runs
/// are reproducible.
pub fn recency_score(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(published) = published else {
        return UNDATED_RECENCY;
    };
    let age_days = (now - published).num_seconds() as f64 / 86_400.0;
    if age_days < FRESH_DAYS {
        return 1.0;
    }
    if age_days >= RECENCY_WINDOW_DAYS {
        return 0.0;
    }
    (1.0 - age_days / RECENCY_WINDOW_DAYS).clamp(0.0, 1.0) as f32
}

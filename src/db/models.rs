//! Database row types for all tables.

use serde::Serialize;
use sqlx::FromRow;

/// A bidding profile. Written by the platform's CRUD layer; the bot only
/// reads it. `skills` and `bid_settings` are JSON-encoded text and may be
/// malformed — the featurizers tolerate that.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbProfile {
    pub id: i64,
    pub owner: String,
    pub skills: Option<String>,
    pub experience_level: Option<String>,
    pub profile_type: Option<String>,
    pub autobid_enabled: bool,
    pub daily_bid_limit: Option<i64>,
    pub bid_settings: Option<String>,
}

/// A prospective job from the discovery feed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbJob {
    pub id: i64,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub description_embedding: Option<serde_json::Value>,
    pub posted_at: Option<f64>,
    pub raw_payload: Option<serde_json::Value>,
}

/// A bid the profile has placed, with its eventual outcome.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbBid {
    pub id: i64,
    pub profile_id: i64,
    pub job_id: i64,
    pub placed_at: f64,
    pub outcome: String,
}

impl DbBid {
    pub fn is_won(&self) -> bool {
        self.outcome == "won"
    }
}

/// Rolling per-profile aggregates, one row per profile, fully overwritten on
/// each refresh. Success rates are `None` when the profile placed zero bids
/// in that window — distinct from a real 0.0.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbHistoricalStats {
    pub profile_id: i64,
    pub success_rate_7d: Option<f64>,
    pub success_rate_30d: Option<f64>,
    pub success_rate_90d: Option<f64>,
    pub bid_frequency_7d: f64,
    pub bid_frequency_30d: f64,
    pub bid_frequency_90d: f64,
    pub last_updated_at: f64,
}

/// Append-only audit log: one row per job evaluated per autobid run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbBidAttempt {
    pub id: i64,
    pub profile_id: i64,
    pub job_id: i64,
    pub decision: String,
    pub probability: Option<f64>,
    pub bid_text: Option<String>,
    pub created_at: f64,
}

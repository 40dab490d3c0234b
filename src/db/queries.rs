//! SQL query functions for all tables.

use super::models::*;
use sqlx::PgPool;

// ── Profiles ─────────────────────────────────────────────────────

pub async fn get_profile(pool: &PgPool, profile_id: i64) -> anyhow::Result<Option<DbProfile>> {
    let row = sqlx::query_as::<_, DbProfile>("SELECT * FROM profiles WHERE id = $1")
        .bind(profile_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn get_autobid_profiles(pool: &PgPool) -> anyhow::Result<Vec<DbProfile>> {
    let rows = sqlx::query_as::<_, DbProfile>(
        "SELECT * FROM profiles WHERE autobid_enabled = TRUE ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ── Jobs ─────────────────────────────────────────────────────────

pub async fn get_job(pool: &PgPool, job_id: i64) -> anyhow::Result<Option<DbJob>> {
    let row = sqlx::query_as::<_, DbJob>("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Upsert a job pulled from the discovery feed, keyed on its external id.
pub async fn upsert_job(
    pool: &PgPool,
    external_id: &str,
    title: &str,
    description: &str,
    description_embedding: Option<&serde_json::Value>,
    posted_at: Option<f64>,
    raw_payload: Option<&serde_json::Value>,
) -> anyhow::Result<i64> {
    let row = sqlx::query_scalar::<_, i64>(
        "INSERT INTO jobs (external_id, title, description, description_embedding, posted_at, raw_payload)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (external_id) DO UPDATE SET
             title = EXCLUDED.title,
             description = EXCLUDED.description,
             description_embedding = EXCLUDED.description_embedding
         RETURNING id",
    )
    .bind(external_id)
    .bind(title)
    .bind(description)
    .bind(description_embedding)
    .bind(posted_at)
    .bind(raw_payload)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ── Bids ─────────────────────────────────────────────────────────

pub async fn get_bids_since(
    pool: &PgPool,
    profile_id: i64,
    cutoff: f64,
) -> anyhow::Result<Vec<DbBid>> {
    let rows = sqlx::query_as::<_, DbBid>(
        "SELECT * FROM bids WHERE profile_id = $1 AND placed_at >= $2 ORDER BY placed_at",
    )
    .bind(profile_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_profiles_with_bids_since(pool: &PgPool, cutoff: f64) -> anyhow::Result<Vec<i64>> {
    let rows = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT profile_id FROM bids WHERE placed_at >= $1 ORDER BY profile_id",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn has_existing_bid(pool: &PgPool, profile_id: i64, job_id: i64) -> anyhow::Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bids WHERE profile_id = $1 AND job_id = $2",
    )
    .bind(profile_id)
    .bind(job_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn insert_bid(
    pool: &PgPool,
    profile_id: i64,
    job_id: i64,
    placed_at: f64,
) -> anyhow::Result<i64> {
    let row = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bids (profile_id, job_id, placed_at, outcome)
         VALUES ($1, $2, $3, 'pending') RETURNING id",
    )
    .bind(profile_id)
    .bind(job_id)
    .bind(placed_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

// ── Historical stats ─────────────────────────────────────────────

pub async fn get_stats(
    pool: &PgPool,
    profile_id: i64,
) -> anyhow::Result<Option<DbHistoricalStats>> {
    let row = sqlx::query_as::<_, DbHistoricalStats>(
        "SELECT * FROM historical_stats WHERE profile_id = $1",
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Full overwrite of the per-profile stats row. Insert on first refresh,
/// update thereafter — rows are never appended or deleted.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_historical_stats(
    pool: &PgPool,
    profile_id: i64,
    success_rate_7d: Option<f64>,
    success_rate_30d: Option<f64>,
    success_rate_90d: Option<f64>,
    bid_frequency_7d: f64,
    bid_frequency_30d: f64,
    bid_frequency_90d: f64,
    last_updated_at: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO historical_stats (profile_id, success_rate_7d, success_rate_30d, success_rate_90d,
             bid_frequency_7d, bid_frequency_30d, bid_frequency_90d, last_updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (profile_id) DO UPDATE SET
             success_rate_7d = EXCLUDED.success_rate_7d,
             success_rate_30d = EXCLUDED.success_rate_30d,
             success_rate_90d = EXCLUDED.success_rate_90d,
             bid_frequency_7d = EXCLUDED.bid_frequency_7d,
             bid_frequency_30d = EXCLUDED.bid_frequency_30d,
             bid_frequency_90d = EXCLUDED.bid_frequency_90d,
             last_updated_at = EXCLUDED.last_updated_at",
    )
    .bind(profile_id)
    .bind(success_rate_7d)
    .bind(success_rate_30d)
    .bind(success_rate_90d)
    .bind(bid_frequency_7d)
    .bind(bid_frequency_30d)
    .bind(bid_frequency_90d)
    .bind(last_updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

// ── Bid attempts (audit log) ─────────────────────────────────────

pub async fn insert_bid_attempt(
    pool: &PgPool,
    profile_id: i64,
    job_id: i64,
    decision: &str,
    probability: Option<f64>,
    bid_text: Option<&str>,
    created_at: f64,
) -> anyhow::Result<i64> {
    let row = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bid_attempts (profile_id, job_id, decision, probability, bid_text, created_at)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(profile_id)
    .bind(job_id)
    .bind(decision)
    .bind(probability)
    .bind(bid_text)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_recent_attempts(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<DbBidAttempt>> {
    let rows = sqlx::query_as::<_, DbBidAttempt>(
        "SELECT * FROM bid_attempts ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_attempts_since(pool: &PgPool, cutoff: f64) -> anyhow::Result<i64> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bid_attempts WHERE created_at >= $1")
            .bind(cutoff)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Bids actually placed (not merely evaluated) since the cutoff — the number
/// the daily quota is charged against.
pub async fn count_bids_placed_since(
    pool: &PgPool,
    profile_id: i64,
    cutoff: f64,
) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bid_attempts
         WHERE profile_id = $1 AND decision = 'bid_placed' AND created_at >= $2",
    )
    .bind(profile_id)
    .bind(cutoff)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

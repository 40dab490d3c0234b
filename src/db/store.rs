//! Read/write seam between the autobid loop and the persistence layer.
//!
//! The orchestrator talks to the data store through this trait so tests can
//! substitute an in-memory fake. Production uses [`PgDataStore`] backed by
//! the query functions in `db::queries`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::DbHistoricalStats;
use super::queries;

/// A bid attempt about to be appended to the audit log.
#[derive(Debug, Clone)]
pub struct NewBidAttempt {
    pub profile_id: i64,
    pub job_id: i64,
    pub decision: String,
    pub probability: Option<f64>,
    pub bid_text: Option<String>,
    pub created_at: f64,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn stats_for(&self, profile_id: i64) -> anyhow::Result<Option<DbHistoricalStats>>;

    /// Count of bids placed by this profile since UTC midnight of `now`.
    async fn bids_placed_today(&self, profile_id: i64, now: DateTime<Utc>) -> anyhow::Result<i64>;

    async fn record_attempt(&self, attempt: NewBidAttempt) -> anyhow::Result<()>;

    /// Record that a bid was actually placed, so discovery can dedup it.
    async fn record_bid(&self, profile_id: i64, job_id: i64, placed_at: f64)
        -> anyhow::Result<()>;
}

/// Epoch seconds of UTC midnight for the given instant.
pub fn start_of_day(now: DateTime<Utc>) -> f64 {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    midnight.timestamp() as f64
}

pub struct PgDataStore {
    db: PgPool,
}

impl PgDataStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn stats_for(&self, profile_id: i64) -> anyhow::Result<Option<DbHistoricalStats>> {
        queries::get_stats(&self.db, profile_id).await
    }

    async fn bids_placed_today(&self, profile_id: i64, now: DateTime<Utc>) -> anyhow::Result<i64> {
        queries::count_bids_placed_since(&self.db, profile_id, start_of_day(now)).await
    }

    async fn record_attempt(&self, attempt: NewBidAttempt) -> anyhow::Result<()> {
        queries::insert_bid_attempt(
            &self.db,
            attempt.profile_id,
            attempt.job_id,
            &attempt.decision,
            attempt.probability,
            attempt.bid_text.as_deref(),
            attempt.created_at,
        )
        .await?;
        Ok(())
    }

    async fn record_bid(
        &self,
        profile_id: i64,
        job_id: i64,
        placed_at: f64,
    ) -> anyhow::Result<()> {
        queries::insert_bid(&self.db, profile_id, job_id, placed_at).await?;
        Ok(())
    }
}

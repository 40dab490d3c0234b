//! Historical stats refresh job.
//!
//! Recomputes the per-profile rolling aggregates (success rate and bid
//! frequency over 7/30/90-day windows) from raw bid history and upserts one
//! row per profile. Success rate is `None` when the profile placed zero bids
//! in a window — "no data" and "0% success" are different facts, and the
//! feature assembler relies on the store preserving that distinction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time;
use tracing::{info, warn};

use crate::config::StatsConfig;
use crate::db::models::DbBid;
use crate::db::queries;
use crate::events::bus::{BotEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;

pub const WINDOWS_DAYS: [i64; 3] = [7, 30, 90];

/// Freshly computed aggregates for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUpdate {
    pub success_rate_7d: Option<f64>,
    pub success_rate_30d: Option<f64>,
    pub success_rate_90d: Option<f64>,
    pub bid_frequency_7d: f64,
    pub bid_frequency_30d: f64,
    pub bid_frequency_90d: f64,
}

/// Counts of per-profile outcomes for one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub updated: usize,
    pub failed: usize,
}

/// Pure window aggregation over a profile's bid history.
pub fn compute_stats(bids: &[DbBid], now: DateTime<Utc>) -> StatsUpdate {
    let now_ts = now.timestamp() as f64;

    let window = |days: i64| -> (Option<f64>, f64) {
        let cutoff = now_ts - (days * 86_400) as f64;
        let in_window: Vec<&DbBid> = bids.iter().filter(|b| b.placed_at >= cutoff).collect();
        let total = in_window.len();
        if total == 0 {
            // Absence, not zero: no bids means the rate is undefined
            return (None, 0.0);
        }
        let wins = in_window.iter().filter(|b| b.is_won()).count();
        (Some(wins as f64 / total as f64), total as f64)
    };

    let [(sr7, bf7), (sr30, bf30), (sr90, bf90)] = WINDOWS_DAYS.map(window);

    StatsUpdate {
        success_rate_7d: sr7,
        success_rate_30d: sr30,
        success_rate_90d: sr90,
        bid_frequency_7d: bf7,
        bid_frequency_30d: bf30,
        bid_frequency_90d: bf90,
    }
}

pub struct StatsRefresher {
    db: PgPool,
    config: StatsConfig,
    event_bus: Arc<EventBus>,
}

impl StatsRefresher {
    pub fn new(db: PgPool, config: StatsConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            db,
            config,
            event_bus,
        }
    }

    /// One full refresh pass over every profile with recent bid activity.
    ///
    /// Per-profile failures are logged and skipped; each upsert is its own
    /// statement, so one profile's database error rolls back alone and never
    /// aborts the batch.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RefreshOutcome {
        let lookback_cutoff =
            now.timestamp() as f64 - (self.config.lookback_days * 86_400) as f64;

        let profile_ids = match queries::get_profiles_with_bids_since(&self.db, lookback_cutoff)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to list profiles for stats refresh");
                return RefreshOutcome::default();
            }
        };

        let mut outcome = RefreshOutcome::default();

        for profile_id in profile_ids {
            match self.refresh_profile(profile_id, lookback_cutoff, now).await {
                Ok(()) => outcome.updated += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(profile_id, error = %e, "stats refresh failed for profile");
                }
            }
        }

        info!(
            updated = outcome.updated,
            failed = outcome.failed,
            "stats refresh pass complete"
        );
        self.event_bus.publish(BotEvent::StatsRefreshed {
            updated: outcome.updated,
            failed: outcome.failed,
        });

        outcome
    }

    async fn refresh_profile(
        &self,
        profile_id: i64,
        lookback_cutoff: f64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let bids = queries::get_bids_since(&self.db, profile_id, lookback_cutoff).await?;
        let update = compute_stats(&bids, now);

        queries::upsert_historical_stats(
            &self.db,
            profile_id,
            update.success_rate_7d,
            update.success_rate_30d,
            update.success_rate_90d,
            update.bid_frequency_7d,
            update.bid_frequency_30d,
            update.bid_frequency_90d,
            now.timestamp() as f64,
        )
        .await?;

        Ok(())
    }
}

/// Periodic driver. Spawned from main as its own task.
pub async fn run_stats_refresh_loop(refresher: Arc<StatsRefresher>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs.max(60));
    info!(interval_secs = interval.as_secs(), "stats refresh loop started");

    loop {
        refresher.run_once(Utc::now()).await;
        time::sleep(interval).await;
    }
}

//! Job discovery — pull candidate jobs for a profile from the external feed.
//!
//! The feed service (scraper/API poller, out of scope here) returns raw job
//! records; this module maps them into `DbJob` rows, persists them, and drops
//! any job the profile has already bid on. Dedup happens here, before
//! evaluation — a job the profile bid on is never decided again.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::db::models::{DbJob, DbProfile};
use crate::db::queries;
use crate::error::BotError;

#[async_trait]
pub trait JobDiscovery: Send + Sync {
    /// Candidate jobs for one profile, deduplicated against its bid history.
    async fn candidate_jobs(&self, profile: &DbProfile) -> anyhow::Result<Vec<DbJob>>;
}

/// A job record as the discovery feed returns it.
#[derive(Debug, Deserialize)]
pub struct FeedJob {
    pub external_id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub description_embedding: Option<serde_json::Value>,
    pub posted_at: Option<f64>,
    #[serde(flatten)]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

pub struct HttpJobDiscovery {
    client: Client,
    base_url: String,
    page_size: usize,
    db: PgPool,
}

impl HttpJobDiscovery {
    pub fn new(config: &DiscoveryConfig, db: PgPool) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            page_size: config.page_size,
            db,
        })
    }

    async fn fetch_feed(&self, profile_id: i64) -> anyhow::Result<Vec<FeedJob>> {
        let url = format!("{}/jobs", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("profile_id", profile_id.to_string()),
                ("limit", self.page_size.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                BotError::Discovery(format!("feed returned {}", response.status())).into(),
            );
        }

        let jobs: Vec<FeedJob> = response.json().await?;
        Ok(jobs)
    }
}

#[async_trait]
impl JobDiscovery for HttpJobDiscovery {
    async fn candidate_jobs(&self, profile: &DbProfile) -> anyhow::Result<Vec<DbJob>> {
        let feed_jobs = self.fetch_feed(profile.id).await?;
        debug!(
            profile_id = profile.id,
            fetched = feed_jobs.len(),
            "discovery feed returned jobs"
        );

        let mut candidates = Vec::with_capacity(feed_jobs.len());

        for fj in feed_jobs {
            let title = fj.title.clone().unwrap_or_else(|| "(untitled)".into());
            let raw = serde_json::Value::Object(fj.raw.clone());

            let job_id = match queries::upsert_job(
                &self.db,
                &fj.external_id,
                &title,
                &fj.description,
                fj.description_embedding.as_ref(),
                fj.posted_at,
                Some(&raw),
            )
            .await
            {
                Ok(id) => id,
                Err(e) => {
                    warn!(external_id = %fj.external_id, error = %e, "failed to persist discovered job");
                    continue;
                }
            };

            // Dedup before evaluation, not after
            match queries::has_existing_bid(&self.db, profile.id, job_id).await {
                Ok(true) => {
                    debug!(profile_id = profile.id, job_id, "already bid on job, excluding");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(profile_id = profile.id, job_id, error = %e, "bid dedup check failed, excluding job");
                    continue;
                }
            }

            candidates.push(DbJob {
                id: job_id,
                external_id: Some(fj.external_id),
                title,
                description: fj.description,
                description_embedding: fj.description_embedding,
                posted_at: fj.posted_at,
                raw_payload: Some(raw),
            });
        }

        Ok(candidates)
    }
}

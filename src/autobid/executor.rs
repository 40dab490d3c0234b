//! Bid submission — fire-and-forget call to the external bid executor.
//!
//! The executor service drives the actual proposal form (browser automation,
//! out of scope). From the bot's side it is a one-way HTTP call: success or
//! failure is logged and recorded, nothing is retried within a run.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::ExecutorConfig;
use crate::error::BotError;

#[async_trait]
pub trait BidExecutor: Send + Sync {
    async fn submit_bid(&self, profile_id: i64, job_id: i64, bid_text: &str)
        -> anyhow::Result<()>;
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    profile_id: i64,
    job_id: i64,
    bid_text: &'a str,
}

pub struct HttpBidExecutor {
    client: Client,
    base_url: String,
}

impl HttpBidExecutor {
    pub fn new(config: &ExecutorConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.submit_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl BidExecutor for HttpBidExecutor {
    async fn submit_bid(
        &self,
        profile_id: i64,
        job_id: i64,
        bid_text: &str,
    ) -> anyhow::Result<()> {
        let url = format!("{}/submit", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitRequest {
                profile_id,
                job_id,
                bid_text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                BotError::Executor(format!("executor returned {}", response.status())).into(),
            );
        }

        info!(profile_id, job_id, "bid submitted to executor");
        Ok(())
    }
}

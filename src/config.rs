//! Configuration — TOML file defaults + environment variable overrides.
//!
//! Tunables live in `config/default.toml`.
//! Secrets (database URL, model reload secret) come from environment variables.

use serde::Deserialize;
use std::env;

use crate::error::BotError;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub stats: StatsConfig,
    pub autobid: AutobidConfig,
    pub pacing: PacingConfig,
    pub discovery: DiscoveryConfig,
    pub executor: ExecutorConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
    /// Probability cutoff for the bid/skip decision.
    #[serde(default = "default_threshold")]
    pub decision_threshold: f64,
    #[serde(default = "default_predict_timeout")]
    pub predict_timeout_ms: u64,
}

fn default_artifact_path() -> String {
    "models/bid_success_model.json".into()
}
fn default_threshold() -> f64 {
    0.5
}
fn default_predict_timeout() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Stats rows older than this are treated as absent by the assembler.
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: f64,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

fn default_refresh_interval() -> u64 {
    3600
}
fn default_staleness_hours() -> f64 {
    36.0
}
fn default_lookback_days() -> i64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutobidConfig {
    #[serde(default = "default_run_interval")]
    pub run_interval_secs: u64,
    /// Used when a profile has no daily_bid_limit of its own.
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i64,
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_run: usize,
}

fn default_run_interval() -> u64 {
    600
}
fn default_daily_limit() -> i64 {
    10
}
fn default_max_candidates() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_profile_delay")]
    pub profile_delay_ms: u64,
    #[serde(default = "default_profile_jitter")]
    pub profile_jitter_ms: u64,
    #[serde(default = "default_submit_delay")]
    pub submit_delay_ms: u64,
    #[serde(default = "default_submit_jitter")]
    pub submit_jitter_ms: u64,
}

fn default_profile_delay() -> u64 {
    3000
}
fn default_profile_jitter() -> u64 {
    4000
}
fn default_submit_delay() -> u64 {
    1500
}
fn default_submit_jitter() -> u64 {
    2500
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_discovery_url() -> String {
    "http://127.0.0.1:9100".into()
}
fn default_fetch_timeout() -> u64 {
    10_000
}
fn default_page_size() -> usize {
    25
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_url")]
    pub base_url: String,
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,
}

fn default_executor_url() -> String {
    "http://127.0.0.1:9200".into()
}
fn default_submit_timeout() -> u64 {
    30_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for POST /api/model/reload. Env-only.
    #[serde(default)]
    pub reload_secret: String,
}

fn default_true() -> bool {
    true
}
fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_output: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from `config/default.toml` merged with env vars.
    /// Overrides use the `AB` prefix, e.g. `AB__MODEL__DECISION_THRESHOLD`.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("AB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Config = builder.try_deserialize()?;

        // Secrets come from env only (these should never be in TOML)
        if let Ok(v) = env::var("DATABASE_URL") {
            cfg.database.url = v;
        }
        if let Ok(v) = env::var("MODEL_RELOAD_SECRET") {
            cfg.web.reload_secret = v;
        }
        if let Ok(v) = env::var("MODEL_ARTIFACT_PATH") {
            cfg.model.artifact_path = v;
        }

        if cfg.database.url.is_empty() {
            return Err(BotError::Config("DATABASE_URL is not set".into()).into());
        }
        if !(0.0..=1.0).contains(&cfg.model.decision_threshold) {
            return Err(BotError::Config(format!(
                "model.decision_threshold must be in [0, 1], got {}",
                cfg.model.decision_threshold
            ))
            .into());
        }

        Ok(cfg)
    }
}

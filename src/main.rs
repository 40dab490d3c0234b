//! Autobid Bot — Entry Point
//!
//! Loads configuration, initializes all subsystems, and runs the main loops.
//! Handles graceful shutdown on SIGINT/SIGTERM.

mod autobid;
mod config;
mod db;
mod decision;
mod error;
mod events;
mod features;
mod logging;
mod predict;
mod stats;
mod web;

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use crate::autobid::discovery::HttpJobDiscovery;
use crate::autobid::executor::HttpBidExecutor;
use crate::autobid::orchestrator::{AutobidOrchestrator, OrchestratorSettings};
use crate::autobid::pacing::Pacer;
use crate::config::Config;
use crate::db::pool;
use crate::db::store::PgDataStore;
use crate::events::bus::EventBus;
use crate::features::assembler::FeatureAssembler;
use crate::predict::service::PredictionService;
use crate::stats::refresh::StatsRefresher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if missing)
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    logging::structured::init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        artifact_path = %config.model.artifact_path,
        decision_threshold = config.model.decision_threshold,
        "autobid-bot starting"
    );

    // Initialize database
    let db_pool = pool::create_pool(&config.database.url).await?;
    pool::run_migrations(&db_pool).await?;
    info!("database connected and migrations applied");

    // Initialize event bus, with a subscriber that mirrors events into the log
    let event_bus = Arc::new(EventBus::new(1024));
    let mut event_rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => info!(?event, "bot event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "event log subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Initialize prediction service — a missing artifact is not fatal, the
    // bot runs (and skips every job) until a reload succeeds
    let prediction = Arc::new(PredictionService::new(config.model.artifact_path.clone()));
    if let Err(e) = prediction.reload() {
        warn!(error = %e, "initial model load failed, starting unloaded");
    }

    // Initialize stats refresher
    let refresher = Arc::new(StatsRefresher::new(
        db_pool.clone(),
        config.stats.clone(),
        event_bus.clone(),
    ));

    // Initialize orchestrator with its external collaborators
    let discovery = Arc::new(HttpJobDiscovery::new(&config.discovery, db_pool.clone())?);
    let executor = Arc::new(HttpBidExecutor::new(&config.executor)?);
    let store = Arc::new(PgDataStore::new(db_pool.clone()));

    let orchestrator = Arc::new(AutobidOrchestrator::new(
        FeatureAssembler::new(config.stats.staleness_hours),
        prediction.clone(),
        store,
        discovery,
        executor,
        event_bus.clone(),
        Pacer::new(config.pacing.submit_delay_ms, config.pacing.submit_jitter_ms),
        OrchestratorSettings {
            decision_threshold: config.model.decision_threshold,
            predict_timeout: Duration::from_millis(config.model.predict_timeout_ms),
            default_daily_limit: config.autobid.default_daily_limit,
            max_candidates_per_run: config.autobid.max_candidates_per_run,
        },
    ));

    // Spawn stats refresh loop
    let refresher_clone = refresher.clone();
    let refresh_interval = config.stats.refresh_interval_secs;
    let _stats_handle = tokio::spawn(async move {
        stats::refresh::run_stats_refresh_loop(refresher_clone, refresh_interval).await;
    });

    // Spawn autobid loop
    let orchestrator_clone = orchestrator.clone();
    let autobid_db = db_pool.clone();
    let profile_pacer = Pacer::new(
        config.pacing.profile_delay_ms,
        config.pacing.profile_jitter_ms,
    );
    let run_interval = config.autobid.run_interval_secs;
    let _autobid_handle = tokio::spawn(async move {
        autobid::orchestrator::run_autobid_loop(
            orchestrator_clone,
            autobid_db,
            profile_pacer,
            run_interval,
        )
        .await;
    });

    // Spawn web server (if enabled)
    let _web_handle = if config.web.enabled {
        let web_server = web::server::WebServer::new(
            config.web.clone(),
            db_pool.clone(),
            prediction.clone(),
            event_bus.clone(),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = web_server.start().await {
                error!(error = %e, "web server error");
            }
        }))
    } else {
        None
    };

    info!("all subsystems started, waiting for shutdown signal");

    // Wait for shutdown signal
    let shutdown = async {
        let ctrl_c = signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => { info!("received SIGINT"); }
            _ = sigterm.recv() => { info!("received SIGTERM"); }
        }
    };

    shutdown.await;

    info!("shutdown complete");
    Ok(())
}

//! Axum HTTP server — prediction serving and model maintenance.

use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use tracing::info;

use crate::config::WebConfig;
use crate::events::bus::EventBus;
use crate::predict::service::PredictionService;

use super::routes;

/// Shared state for all web routes.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub prediction: Arc<PredictionService>,
    pub event_bus: Arc<EventBus>,
    pub reload_secret: String,
}

/// HTTP server exposing /api/predict, /api/model/reload and audit reads.
pub struct WebServer {
    config: WebConfig,
    state: AppState,
}

impl WebServer {
    pub fn new(
        config: WebConfig,
        db: PgPool,
        prediction: Arc<PredictionService>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let reload_secret = config.reload_secret.clone();
        Self {
            config,
            state: AppState {
                db,
                prediction,
                event_bus,
                reload_secret,
            },
        }
    }

    /// Start the HTTP server.
    pub async fn start(self) -> anyhow::Result<()> {
        let app = Router::new()
            .merge(routes::api_routes())
            .with_state(self.state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.port));
        info!(port = self.config.port, "web server starting");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

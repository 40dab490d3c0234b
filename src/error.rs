//! Unified error types for the autobid bot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Prediction-service failures. `NotLoaded` and `Inference` are deliberately
/// separate variants: callers report them differently, but both mean "no
/// decision possible" to the autobid loop.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no model loaded")]
    NotLoaded,

    #[error("failed to load model artifact from {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("inference error: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

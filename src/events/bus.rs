//! Internal event broadcast — tokio::broadcast channel for cross-component events.

use serde::Serialize;
use tokio::sync::broadcast;

/// Bot-wide events for alerting, logging, and monitoring.
#[derive(Debug, Clone, Serialize)]
pub enum BotEvent {
    /// A bid was submitted to the executor.
    BidPlaced {
        profile_id: i64,
        job_id: i64,
        probability: f64,
    },
    /// A candidate job was evaluated and skipped.
    BidSkipped {
        profile_id: i64,
        job_id: i64,
        reason: String,
        probability: Option<f64>,
    },
    /// A profile hit its daily bid quota; remaining candidates unevaluated.
    QuotaReached {
        profile_id: i64,
        placed_today: i64,
    },
    /// A whole profile run failed (discovery error etc.).
    ProfileRunFailed {
        profile_id: i64,
        reason: String,
    },
    /// The model artifact was hot-swapped.
    ModelReloaded {
        model_info: String,
    },
    /// A stats refresh pass finished.
    StatsRefreshed {
        updated: usize,
        failed: usize,
    },
}

/// Central event bus for broadcasting events to all subscribers.
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: BotEvent) {
        // Ignore error if no subscribers
        let _ = self.tx.send(event);
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }
}

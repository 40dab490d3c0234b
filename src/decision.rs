//! Decision policy — pure threshold rule turning a probability into a
//! bid/skip outcome. The threshold is configuration, not learned.

/// Terminal outcome of scoring one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Bid,
    SkipLowProbability,
    /// No probability was available (model unloaded, inference error, or
    /// timeout). The bot never bids blindly.
    SkipPredictionFailed,
}

pub fn decide(probability: Option<f64>, threshold: f64) -> Decision {
    match probability {
        None => Decision::SkipPredictionFailed,
        Some(p) if p >= threshold => Decision::Bid,
        Some(_) => Decision::SkipLowProbability,
    }
}

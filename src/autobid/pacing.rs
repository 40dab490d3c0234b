//! Cooperative pacing for external call sites.
//!
//! The bid executor and job-discovery feed sit behind rate-limited services,
//! so the bot inserts a randomized delay between profiles and between
//! submissions. A parameterized abstraction instead of ad hoc sleeps — not a
//! correctness mechanism, just politeness.

use rand::Rng;
use std::time::Duration;
use tokio::time;

#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    base: Duration,
    jitter: Duration,
}

impl Pacer {
    pub fn new(base_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    /// Next delay: base plus a uniform draw from [0, jitter].
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.base + Duration::from_millis(extra)
    }

    pub async fn wait(&self) {
        let d = self.next_delay();
        if !d.is_zero() {
            time::sleep(d).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_bounds() {
        let pacer = Pacer::new(100, 50);
        for _ in 0..100 {
            let d = pacer.next_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let pacer = Pacer::new(200, 0);
        assert_eq!(pacer.next_delay(), Duration::from_millis(200));
    }
}

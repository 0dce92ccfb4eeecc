//! Frame-dropping rate limiter.

use std::time::Duration;
use tokio::time::Instant;

/// Admits at most `fps` frames per second. Excess frames are dropped by
/// the caller; the limiter never sleeps.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_admitted: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter. `fps <= 0` (or non-finite) admits everything.
    pub fn new(fps: f64) -> Self {
        let min_interval = (fps.is_finite() && fps > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / fps).ok())
            .flatten();
        Self {
            min_interval,
            last_admitted: None,
        }
    }

    /// Whether a frame arriving at `now` should go to inference.
    pub fn admit(&mut self, now: Instant) -> bool {
        let Some(interval) = self.min_interval else {
            return true;
        };
        match self.last_admitted {
            Some(last) if now.saturating_duration_since(last) < interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    /// Time left before a frame arriving at `now` would be admitted.
    pub fn wait_time(&self, now: Instant) -> Duration {
        match (self.min_interval, self.last_admitted) {
            (Some(interval), Some(last)) => {
                interval.saturating_sub(now.saturating_duration_since(last))
            }
            _ => Duration::ZERO,
        }
    }
}

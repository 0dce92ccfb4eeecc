//! Reconnect backoff policy.

use crate::config::{ReconnectConfig, ReconnectStrategy};
use std::time::Duration;

/// Delay schedule and attempt bound for reconnecting a stream.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    strategy: ReconnectStrategy,
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Attempts before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.strategy {
            ReconnectStrategy::Fixed => self.delay,
            ReconnectStrategy::Exponential => {
                let mut delay = self.delay;
                for _ in 1..attempt {
                    delay = next_delay(delay, self.multiplier, self.max_delay);
                    if delay >= self.max_delay {
                        break;
                    }
                }
                delay.min(self.max_delay)
            }
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            strategy: config.strategy,
            delay: Duration::from_secs(config.delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs.max(config.delay_secs)),
            multiplier: config.multiplier,
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

/// Grow `current` by `multiplier`, clamped to `max`.
fn next_delay(current: Duration, multiplier: f64, max: Duration) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
        .unwrap_or(max)
        .min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        for attempt in 1..=3 {
            assert_eq!(policy.delay_for(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_exponential_sequence_clamps() {
        let policy = ReconnectPolicy::from(&ReconnectConfig {
            strategy: ReconnectStrategy::Exponential,
            delay_secs: 1,
            max_delay_secs: 10,
            multiplier: 2.0,
            max_attempts: 8,
        });
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_next_delay_custom_multiplier() {
        let d = next_delay(Duration::from_secs(2), 3.0, Duration::from_secs(60));
        assert_eq!(d, Duration::from_secs(6));
    }
}

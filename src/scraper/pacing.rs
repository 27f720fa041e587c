use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Randomized delay ranges for human-like pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Lower bound of the delay between interactions in milliseconds (default: 2000)
    pub min_delay_ms: u64,

    /// Upper bound of the delay between interactions in milliseconds (default: 4000)
    pub max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 2000,
            max_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(config: &PacingConfig) -> Self {
        Self::between(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn between(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { min, max }
    }

    /// No waiting at all
    pub fn none() -> Self {
        Self::between(Duration::ZERO, Duration::ZERO)
    }

    /// Draw one delay from the configured range
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let ms = rand::rng().random_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(ms as u64)
    }

    /// Sleep for a randomized delay
    pub async fn pause(&self) {
        let delay = self.sample();
        if delay.is_zero() {
            return;
        }
        debug!("Waiting {:.1}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }

    /// Sleep for a delay scaled up from the configured range,
    /// used for longer breaks such as after a failed search.
    pub async fn pause_scaled(&self, factor: u32) {
        let delay = self.sample() * factor.max(1);
        if delay.is_zero() {
            return;
        }
        debug!("Waiting {:.1}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

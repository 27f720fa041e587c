use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::{CrawlError, Result};

/// Retry settings for operations against the live page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per operation (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds, doubled each retry (default: 2000)
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
        }
    }
}

/// Result of a supervised operation. Never an `Err`: callers decide
/// whether a failure skips one item or ends the run.
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    /// A structural failure; retrying would not help
    Skipped(CrawlError),
    /// Transient failures until attempts ran out
    Exhausted(CrawlError),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Done(value) => Ok(value),
            Outcome::Skipped(e) | Outcome::Exhausted(e) => Err(e),
        }
    }
}

/// Wraps page operations with bounded retries and escalating waits.
#[derive(Debug, Clone)]
pub struct Supervisor {
    max_attempts: u32,
    base_delay: Duration,
}

impl Supervisor {
    pub fn new(config: &RetryConfig) -> Self {
        Self::with_attempts(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    pub fn with_attempts(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds, fails structurally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Outcome::Done(value);
                }
                Err(e) if !e.is_transient() => {
                    debug!("{} failed structurally: {}", label, e);
                    return Outcome::Skipped(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!("{} failed after {} attempts: {}", label, attempt, e);
                    return Outcome::Exhausted(e);
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        delay.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

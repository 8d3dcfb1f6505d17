use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::config::RetryConfig;
use crate::error::Result;

/// Exponential backoff around a single fallible async step.
///
/// Holds no state between calls; every `execute` starts with a full budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            backoff_factor: cfg.backoff_factor,
            jitter_factor: if cfg.jitter_factor.is_finite() {
                cfg.jitter_factor.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Delay before the retry taken while `retries_left` retries remain.
    pub fn delay_for(&self, retries_left: u32) -> Duration {
        let exponent = self.max_retries.saturating_sub(retries_left);
        let scaled = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(1.0 - self.jitter_factor..=1.0 + self.jitter_factor);
        let millis = (delay.as_millis() as f64 * spread) as u64;
        std::cmp::min(Duration::from_millis(millis), self.max_delay)
    }

    /// Runs `operation`, retrying transient failures with backoff.
    ///
    /// Fatal errors and the last error after the budget is spent are
    /// returned unchanged.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries_left = self.max_retries;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if retries_left > 0 && err.is_retryable() => {
                    let delay = self.jittered(self.delay_for(retries_left));
                    tracing::warn!(
                        step = label,
                        delay_ms = delay.as_millis() as u64,
                        retries_left,
                        error = %err,
                        "Retrying after transient failure"
                    );
                    sleep(delay).await;
                    retries_left -= 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::error!(step = label, error = %err, "Retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

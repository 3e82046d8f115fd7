//! Retry policy with exponential backoff and jitter

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::ProviderDescriptor;
use crate::core::errors::{Result, TranslationError};

/// Upper bound of the jitter, as a fraction of the computed delay
const JITTER_FRACTION: f64 = 0.1;

/// Bounded exponential backoff for one provider
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Self {
        Self {
            max_retries: descriptor.max_retries,
            initial_delay: descriptor.initial_retry_delay(),
            max_delay: descriptor.max_retry_delay(),
            multiplier: descriptor.backoff_multiplier.max(1.0),
        }
    }

    /// Delay without jitter for attempt `n` (starting at 0)
    fn base_delay(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent)
    }

    /// `min(initial * multiplier^n + jitter, max_delay)`, jitter uniform in `[0, 0.1 * delay]`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION) * base;
        let max = self.max_delay.as_secs_f64();
        let delay = (base + jitter).min(max);
        if delay.is_finite() {
            Duration::from_secs_f64(delay.max(0.0))
        } else {
            self.max_delay
        }
    }

    /// True iff `attempt_count < max_retries` and the error is retryable
    pub fn should_retry(&self, error: &TranslationError, attempt_count: u32) -> bool {
        attempt_count < self.max_retries && error.is_retryable()
    }

    /// Backoff honouring a provider-supplied `Retry-After`, still capped by `max_delay`
    fn delay_after(&self, error: &TranslationError, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        match error {
            TranslationError::RateLimitExceeded {
                retry_after: Some(secs),
            } => delay.max(Duration::from_secs(*secs)).min(self.max_delay),
            _ => delay,
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or retries run out.
    ///
    /// Returns the value together with the number of attempts made. On exhaustion the last
    /// retryable error is wrapped in `MaxRetriesExceeded`.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> (Result<T>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            let attempts = retries + 1;
            match operation(retries).await {
                Ok(value) => {
                    if retries > 0 {
                        info!("Successfully translated after {} retries", retries);
                    }
                    return (Ok(value), attempts);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!("Non-retryable error: {}", error);
                        return (Err(error), attempts);
                    }

                    if !self.should_retry(&error, retries) {
                        warn!(
                            "Max retries ({}) exceeded. Last error: {}",
                            self.max_retries, error
                        );
                        return (
                            Err(TranslationError::MaxRetriesExceeded {
                                attempts,
                                source: Box::new(error),
                            }),
                            attempts,
                        );
                    }

                    let delay = self.delay_after(&error, retries);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}...",
                        attempts, error, delay
                    );
                    sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }
}

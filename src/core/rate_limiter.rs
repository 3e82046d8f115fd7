//! Per-provider token bucket rate limiting

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Token bucket state, refilled lazily on every acquire
#[derive(Debug)]
struct Bucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Time until one whole token is available
    fn wait_time(&self) -> Duration {
        Duration::from_secs_f64((1.0 - self.tokens).max(0.0) / self.refill_rate)
    }
}

/// Token bucket limiter gating outbound requests of one provider.
///
/// Waiters queue on a fair (FIFO) async mutex and hold it while they sleep for their
/// token, so concurrent callers are served in arrival order and nobody starves.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with `capacity` burst tokens refilled at `refill_rate` tokens/second
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        if capacity == 0 || refill_rate <= 0.0 {
            return Self::unlimited();
        }
        Self {
            bucket: Some(Mutex::new(Bucket {
                capacity: f64::from(capacity),
                refill_rate,
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            })),
        }
    }

    /// One second of burst at `rate` requests per second; 0 means unlimited
    pub fn per_second(rate: u32) -> Self {
        Self::new(rate, f64::from(rate))
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    pub fn is_unlimited(&self) -> bool {
        self.bucket.is_none()
    }

    /// Wait until a token is available, then consume it
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        let mut bucket = bucket.lock().await;
        loop {
            bucket.refill(Instant::now());
            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                return;
            }
            let wait = bucket.wait_time();
            debug!("Rate limiter waiting {:?} for a token", wait);
            sleep(wait).await;
        }
    }

    /// Tokens currently available, after a lazy refill
    pub async fn available(&self) -> Option<f64> {
        let bucket = self.bucket.as_ref()?;
        let mut bucket = bucket.lock().await;
        bucket.refill(Instant::now());
        Some(bucket.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unlimited_returns_immediately() {
        let limiter = RateLimiter::per_second(0);
        assert!(limiter.is_unlimited());
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.available().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_throttle() {
        let limiter = RateLimiter::new(2, 2.0);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Third token needs half a second of refill at 2 tokens/s
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(499), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(510), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_never_exceed_capacity() {
        let limiter = RateLimiter::new(3, 10.0);
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        let tokens = limiter.available().await.unwrap();
        assert!((tokens - 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_spaced() {
        let limiter = Arc::new(RateLimiter::per_second(1));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();

        // One burst token, then one per second
        assert_eq!(finished[0], Duration::ZERO);
        assert!(finished[3] >= Duration::from_millis(2990), "{:?}", finished);
    }
}

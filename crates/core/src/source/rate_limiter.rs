//! Token bucket rate limiter for outbound archive requests.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

/// Token bucket: tokens refill at a constant rate and each request consumes one.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket. A rate of 0 is treated as 1.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take a token, or return how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        match self.shortfall() {
            None => {
                self.tokens -= 1.0;
                Ok(())
            }
            Some(wait) => Err(wait),
        }
    }

    /// Whole tokens currently in the bucket.
    pub fn available(&mut self) -> u32 {
        self.refill();
        self.tokens.floor() as u32
    }

    fn shortfall(&self) -> Option<Duration> {
        (self.tokens < 1.0).then(|| Duration::from_secs_f32((1.0 - self.tokens) / self.refill_rate))
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Async wrapper around a [`TokenBucket`] shared by every request of a client.
///
/// Callers never fail on an empty bucket: [`RateLimiter::acquire`] sleeps
/// until the next token refills.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
        }
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            debug!("Archive rate limit reached, waiting {}ms", wait.as_millis());
            sleep(wait).await;
        }
    }

    /// Requests that can be sent right now without waiting.
    pub async fn available(&self) -> u32 {
        self.bucket.lock().await.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(120);
        assert_eq!(bucket.capacity, 120.0);
        assert_eq!(bucket.tokens, 120.0);
        assert!((bucket.refill_rate - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_token_bucket_zero_rate_is_clamped() {
        let mut bucket = TokenBucket::new(0);
        assert!(bucket.try_acquire().is_ok());
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_token_bucket_drains_then_reports_wait() {
        let mut bucket = TokenBucket::new(10);
        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        let wait = bucket.try_acquire().unwrap_err();
        // 10 rpm refills one token every 6 seconds
        assert!(wait.as_secs() <= 6);
        assert!(wait.as_millis() > 0);
    }

    #[test]
    fn test_token_bucket_available() {
        let mut bucket = TokenBucket::new(10);
        assert_eq!(bucket.available(), 10);

        for _ in 0..4 {
            bucket.try_acquire().unwrap();
        }
        assert_eq!(bucket.available(), 6);
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_instead_of_failing() {
        // 600 rpm = one token every 100ms
        let limiter = RateLimiter::new(600);
        for _ in 0..600 {
            limiter.acquire().await;
        }
        assert!(limiter.available().await <= 1);

        let start = std::time::Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();

        assert!(waited >= std::time::Duration::from_millis(50));
        assert!(waited < std::time::Duration::from_secs(2));
    }
}

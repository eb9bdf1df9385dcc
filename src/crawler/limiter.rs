//! Token-bucket rate limiter
//!
//! One limiter instance is shared by every task that talks to the same
//! logical target. Tokens refill continuously from elapsed time rather than
//! on fixed ticks.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket holding at most `rate` tokens, refilled at `rate` per `per`
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    per: Duration,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, per: Duration) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_secs_f64() * rate / per.as_secs_f64();
        self.tokens = (self.tokens + earned).min(rate);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a full bucket allowing `rate` acquisitions per `per`
    ///
    /// A zero `rate` is treated as one.
    pub fn new(rate: u32, per: Duration) -> Self {
        let rate = f64::from(rate.max(1));
        Self {
            rate,
            per,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Creates a limiter from a rate and a period given in seconds
    pub fn per_secs(rate: u32, per_secs: f64) -> Self {
        Self::new(rate, Duration::from_secs_f64(per_secs))
    }

    /// Waits until a token is available and consumes it
    ///
    /// The bucket lock is held while waiting, so concurrent callers are
    /// served one at a time in arrival order.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.per);

        if bucket.tokens < 1.0 {
            let deficit = 1.0 - bucket.tokens;
            let wait = self.per.mul_f64(deficit / self.rate);
            tracing::trace!("Rate limiter exhausted, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
            bucket.tokens = 1.0;
            bucket.last_refill = Instant::now();
        }

        bucket.tokens -= 1.0;
    }

    /// Tokens currently available, after refilling
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.per);
        bucket.tokens
    }
}

use crate::config::{RateLimit, RateLimits};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// One bucket per partner endpoint family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitBucket {
    EventListing,
    EventAck,
    AppointmentDetail,
    SessionDetail,
}

#[async_trait::async_trait]
pub trait IRateLimiter: Send + Sync {
    /// Waits until `cost` tokens are available in `bucket` and takes them
    async fn acquire(&self, bucket: RateLimitBucket, cost: u32);
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens per second
    rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(limit: RateLimit) -> Self {
        let capacity = f64::from(limit.limit.max(1));
        let interval_secs = (limit.interval_millis.max(1) as f64) / 1000.0;
        Self {
            tokens: capacity,
            capacity,
            rate: capacity / interval_secs,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Takes the tokens or tells how long to wait before trying again
    fn try_acquire(&mut self, cost: f64) -> Result<(), Duration> {
        self.refill();
        // A cost above capacity could never be served
        let cost = cost.min(self.capacity);
        if self.tokens >= cost {
            self.tokens -= cost;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((cost - self.tokens) / self.rate))
        }
    }
}

/// In-process token buckets, replenished continuously at `limit / interval`
pub struct TokenBucketRateLimiter {
    limits: RateLimits,
    buckets: Mutex<HashMap<RateLimitBucket, TokenBucket>>,
}

impl TokenBucketRateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<RateLimitBucket, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IRateLimiter for TokenBucketRateLimiter {
    async fn acquire(&self, bucket: RateLimitBucket, cost: u32) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();
                let token_bucket = buckets
                    .entry(bucket)
                    .or_insert_with(|| TokenBucket::new(self.limits.for_bucket(bucket)));
                match token_bucket.try_acquire(f64::from(cost)) {
                    Ok(()) => return,
                    Err(wait_time) => wait_time,
                }
            };

            debug!("Rate limiter: waiting {:?} for bucket {:?}", wait_time, bucket);
            tokio::time::sleep(wait_time).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(limit: u32, interval_millis: u64) -> RateLimits {
        let limit = RateLimit {
            limit,
            interval_millis,
        };
        RateLimits {
            event_listing: limit,
            event_ack: limit,
            appointment_detail: limit,
            session_detail: limit,
        }
    }

    #[test]
    fn bucket_reports_wait_time_when_empty() {
        let mut bucket = TokenBucket::new(RateLimit {
            limit: 2,
            interval_millis: 1000,
        });
        assert!(bucket.try_acquire(1.0).is_ok());
        assert!(bucket.try_acquire(1.0).is_ok());
        let wait = bucket.try_acquire(1.0).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let limiter = TokenBucketRateLimiter::new(limits(1, 100));
        let start = Instant::now();
        limiter.acquire(RateLimitBucket::EventAck, 1).await;
        limiter.acquire(RateLimitBucket::EventAck, 1).await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn buckets_are_independent() {
        let limiter = TokenBucketRateLimiter::new(limits(1, 60_000));
        let start = Instant::now();
        limiter.acquire(RateLimitBucket::EventListing, 1).await;
        limiter.acquire(RateLimitBucket::EventAck, 1).await;
        limiter.acquire(RateLimitBucket::SessionDetail, 1).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}

//! Injected per-key request rate limiting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait RateLimiter: Send + Sync {
    /// Takes one permit for `key`, returning `false` when none is available.
    fn try_acquire(&self, key: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedRateLimiter;

impl RateLimiter for UnlimitedRateLimiter {
    fn try_acquire(&self, _key: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refreshed_at: Instant,
}

/// Token bucket per key: holds up to `capacity` permits and regains `capacity` permits
/// per `period`, continuously.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    capacity: f64,
    refill_per_second: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketRateLimiter {
    pub fn new(capacity: u32, period: Duration) -> Self {
        let capacity = f64::from(capacity.max(1));
        let seconds = period.as_secs_f64().max(f64::EPSILON);

        Self {
            capacity,
            refill_per_second: capacity / seconds,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    fn acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            refreshed_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.refreshed_at);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        bucket.refreshed_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl RateLimiter for TokenBucketRateLimiter {
    fn try_acquire(&self, key: &str) -> bool {
        self.acquire_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_allows_burst_then_refills() {
        let limiter = TokenBucketRateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.acquire_at("u1", start));
        assert!(limiter.acquire_at("u1", start));
        assert!(!limiter.acquire_at("u1", start));

        assert!(!limiter.acquire_at("u1", start + Duration::from_secs(10)));
        assert!(limiter.acquire_at("u1", start + Duration::from_secs(31)));
    }

    #[test]
    fn keys_have_independent_buckets() {
        let limiter = TokenBucketRateLimiter::per_minute(1);

        assert!(limiter.try_acquire("u1"));
        assert!(!limiter.try_acquire("u1"));
        assert!(limiter.try_acquire("u2"));
        assert!(UnlimitedRateLimiter.try_acquire("u1"));
    }
}

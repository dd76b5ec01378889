// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate limiters deciding how long a failed key waits before it is retried.
//!
//! The default controller limiter is the maximum of two limiters:
//!
//! - **Per-item exponential backoff** - 5ms doubled on every consecutive
//!   failure of the same key, capped at 1000s
//! - **Overall token bucket** - 10 requeues per second with a burst of 100,
//!   shared across all keys
//!
//! # Retry Schedule
//!
//! For a single failing key (bucket not exhausted):
//!
//! 1. 5ms
//! 2. 10ms
//! 3. 20ms
//! 4. 40ms
//! 5. ...doubling until 1000s
//!
//! Calling [`RateLimiter::forget`] after a successful pass resets the key.

use crate::constants::{
    QUEUE_BUCKET_BURST, QUEUE_BUCKET_QPS, QUEUE_ITEM_BASE_DELAY_MILLIS, QUEUE_ITEM_MAX_DELAY_SECS,
};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Decides the delay before a key is re-added after a failure.
pub trait RateLimiter<K>: Send + Sync {
    /// Delay before `key` should be retried. Counts as one more failure.
    fn when(&self, key: &K) -> Duration;

    /// Stop tracking `key`, resetting its backoff.
    fn forget(&self, key: &K);

    /// Number of failures recorded for `key` since it was last forgotten.
    fn num_requeues(&self, key: &K) -> u32;
}

/// Per-key exponential backoff.
pub struct ItemExponentialFailureRateLimiter<K> {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound of any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive failures
    pub multiplier: u32,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K: Eq + Hash + Clone> ItemExponentialFailureRateLimiter<K> {
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier: 2,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone + Send> RateLimiter<K> for ItemExponentialFailureRateLimiter<K> {
    fn when(&self, key: &K) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key.clone()).or_insert(0);
        let exp = *count;
        *count = count.saturating_add(1);

        self.multiplier
            .checked_pow(exp)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |backoff| backoff.min(self.max_delay))
    }

    fn forget(&self, key: &K) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket shared across all keys.
///
/// Every call reserves one token; when the bucket is empty the returned delay
/// is the time until that reservation is covered.
pub struct BucketRateLimiter {
    /// Tokens added per second
    pub qps: f64,
    /// Bucket capacity
    pub burst: u32,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    #[must_use]
    pub fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }
}

impl<K> RateLimiter<K> for BucketRateLimiter {
    fn when(&self, _key: &K) -> Duration {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(f64::from(self.burst));
        bucket.last = now;
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 || self.qps <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }

    fn forget(&self, _key: &K) {}

    fn num_requeues(&self, _key: &K) -> u32 {
        0
    }
}

/// Returns the longest delay of all inner limiters.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Box<dyn RateLimiter<K>>>,
}

impl<K> MaxOfRateLimiter<K> {
    #[must_use]
    pub fn new(limiters: Vec<Box<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(&self, key: &K) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(&self, key: &K) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(&self, key: &K) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// The standard controller rate limiter (per-item backoff + overall bucket).
#[must_use]
pub fn default_controller_rate_limiter<K>() -> MaxOfRateLimiter<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(QUEUE_ITEM_BASE_DELAY_MILLIS),
            Duration::from_secs(QUEUE_ITEM_MAX_DELAY_SECS),
        )),
        Box::new(BucketRateLimiter::new(QUEUE_BUCKET_QPS, QUEUE_BUCKET_BURST)),
    ])
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod rate_limiter_tests;

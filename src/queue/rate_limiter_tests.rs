// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `rate_limiter.rs`

#[cfg(test)]
mod tests {
    use super::super::{
        default_controller_rate_limiter, BucketRateLimiter, ItemExponentialFailureRateLimiter,
        RateLimiter,
    };
    use std::time::Duration;

    /// Test that per-item backoff doubles on each failure
    #[test]
    fn test_item_backoff_doubles() {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let key = "ns/lb1".to_string();

        assert_eq!(limiter.when(&key), Duration::from_millis(5));
        assert_eq!(limiter.when(&key), Duration::from_millis(10));
        assert_eq!(limiter.when(&key), Duration::from_millis(20));
        assert_eq!(limiter.num_requeues(&key), 3);
    }

    /// Test that per-item backoff is capped at the max delay
    #[test]
    fn test_item_backoff_capped() {
        let limiter =
            ItemExponentialFailureRateLimiter::new(Duration::from_millis(5), Duration::from_secs(1));
        let key = "ns/lb1".to_string();

        for _ in 0..100 {
            assert!(limiter.when(&key) <= Duration::from_secs(1));
        }
        assert_eq!(
            limiter.when(&key),
            Duration::from_secs(1),
            "Backoff should saturate at max delay"
        );
    }

    /// Test that forget resets a key without touching others
    #[test]
    fn test_item_backoff_forget() {
        let limiter = ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(5),
            Duration::from_secs(1000),
        );
        let a = "ns/a".to_string();
        let b = "ns/b".to_string();

        limiter.when(&a);
        limiter.when(&a);
        limiter.when(&b);
        limiter.forget(&a);

        assert_eq!(limiter.num_requeues(&a), 0);
        assert_eq!(limiter.num_requeues(&b), 1);
        assert_eq!(limiter.when(&a), Duration::from_millis(5));
    }

    /// Test that the bucket allows a burst before delaying
    #[tokio::test(start_paused = true)]
    async fn test_bucket_burst_then_delay() {
        let limiter = BucketRateLimiter::new(10.0, 3);
        let key = "ns/lb1".to_string();

        for _ in 0..3 {
            assert_eq!(RateLimiter::<String>::when(&limiter, &key), Duration::ZERO);
        }
        let delay = RateLimiter::<String>::when(&limiter, &key);
        assert!(
            delay > Duration::from_millis(90) && delay <= Duration::from_millis(100),
            "Fourth request should wait roughly one token interval, got {delay:?}"
        );
    }

    /// Test that the bucket refills over time
    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills() {
        let limiter = BucketRateLimiter::new(10.0, 1);
        let key = "ns/lb1".to_string();

        assert_eq!(RateLimiter::<String>::when(&limiter, &key), Duration::ZERO);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(RateLimiter::<String>::when(&limiter, &key), Duration::ZERO);
    }

    /// Test that the default limiter reports the item backoff while the bucket has tokens
    #[tokio::test(start_paused = true)]
    async fn test_default_controller_rate_limiter() {
        let limiter = default_controller_rate_limiter::<String>();
        let key = "ns/lb1".to_string();

        assert_eq!(limiter.when(&key), Duration::from_millis(5));
        assert_eq!(limiter.when(&key), Duration::from_millis(10));
        assert_eq!(limiter.num_requeues(&key), 2);

        limiter.forget(&key);
        assert_eq!(limiter.num_requeues(&key), 0);
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the work queue

#[cfg(test)]
mod tests {
    use super::super::WorkQueue;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn queue() -> Arc<WorkQueue<String>> {
        Arc::new(WorkQueue::new("test"))
    }

    /// Test that duplicate adds while queued collapse into one item
    #[tokio::test]
    async fn test_duplicate_adds_coalesce() {
        let q = queue();
        q.add("ns/a".to_string());
        q.add("ns/a".to_string());
        q.add("ns/b".to_string());

        assert_eq!(q.len(), 2, "Duplicate key should be coalesced");
        assert_eq!(q.get().await.as_deref(), Some("ns/a"));
        assert_eq!(q.get().await.as_deref(), Some("ns/b"));
        assert!(q.is_empty());
    }

    /// Test that an add while in flight is redelivered once after done
    #[tokio::test]
    async fn test_add_while_processing_requeues_after_done() {
        let q = queue();
        q.add("ns/a".to_string());
        let key = q.get().await.unwrap();

        q.add(key.clone());
        q.add(key.clone());
        assert_eq!(q.len(), 0, "In-flight key must not be handed out again");

        q.done(&key);
        assert_eq!(q.len(), 1, "Dirty key should be requeued exactly once");
        assert_eq!(q.get().await, Some(key.clone()));
        q.done(&key);
        assert!(q.is_empty());
    }

    /// Test that done without a re-add does not requeue
    #[tokio::test]
    async fn test_done_without_readd() {
        let q = queue();
        q.add("ns/a".to_string());
        let key = q.get().await.unwrap();
        q.done(&key);
        assert!(q.is_empty());
    }

    /// Test that get waits until a key is added
    #[tokio::test]
    async fn test_get_blocks_until_add() {
        let q = queue();
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.get().await })
        };

        tokio::task::yield_now().await;
        q.add("ns/late".to_string());

        let got = tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .expect("consumer should be woken")
            .unwrap();
        assert_eq!(got.as_deref(), Some("ns/late"));
    }

    /// Test that shutdown wakes all waiting workers and hands out nothing more
    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let q = queue();
        let mut workers = Vec::new();
        for _ in 0..3 {
            let q = Arc::clone(&q);
            workers.push(tokio::spawn(async move { q.get().await }));
        }
        tokio::task::yield_now().await;

        q.shut_down();
        for worker in workers {
            let got = tokio::time::timeout(Duration::from_secs(5), worker)
                .await
                .expect("worker should exit after shutdown")
                .unwrap();
            assert!(got.is_none());
        }

        q.add("ns/a".to_string());
        assert!(q.is_empty(), "Adds after shutdown are ignored");
        assert!(q.get().await.is_none());
    }

    /// Test that add_after delivers the key only once the delay elapsed
    #[tokio::test(start_paused = true)]
    async fn test_add_after() {
        let q = queue();
        q.add_after("ns/a".to_string(), Duration::from_secs(5));
        q.add_after("ns/a".to_string(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(q.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(q.len(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(q.len(), 1, "Later duplicate deadline should not add again");
    }

    /// Test that rate limited requeues back off and forget resets them
    #[tokio::test(start_paused = true)]
    async fn test_add_rate_limited_and_forget() {
        let q = queue();
        let key = "ns/a".to_string();

        q.add_rate_limited(key.clone());
        q.add_rate_limited(key.clone());
        assert_eq!(q.num_requeues(&key), 2);

        tokio::time::sleep(Duration::from_millis(6)).await;
        assert_eq!(q.get().await, Some(key.clone()));
        q.done(&key);

        q.forget(&key);
        assert_eq!(q.num_requeues(&key), 0);
    }

    /// Test that concurrent workers never hold the same key at the same time
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_per_key_mutual_exclusion() {
        let q = queue();
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let processed = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            let in_flight = Arc::clone(&in_flight);
            let processed = Arc::clone(&processed);
            workers.push(tokio::spawn(async move {
                while let Some(key) = q.get().await {
                    assert!(
                        in_flight.lock().unwrap().insert(key.clone()),
                        "key {key} handed to two workers"
                    );
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    in_flight.lock().unwrap().remove(&key);
                    processed.fetch_add(1, Ordering::SeqCst);
                    q.done(&key);
                }
            }));
        }

        for round in 0..50 {
            q.add(format!("ns/lb{}", round % 3));
            tokio::task::yield_now().await;
        }

        // Wait until the queue drains and nothing is in flight.
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if q.is_empty() && in_flight.lock().unwrap().is_empty() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    if q.is_empty() && in_flight.lock().unwrap().is_empty() {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue should drain");

        q.shut_down();
        for worker in workers {
            worker.await.unwrap();
        }
        assert!(processed.load(Ordering::SeqCst) >= 3);
    }
}

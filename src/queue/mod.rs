// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deduplicating, rate-limited work queue of reconciliation keys.
//!
//! The queue tracks three sets:
//!
//! - **queue** - keys waiting to be handed to a worker, in FIFO order
//! - **dirty** - keys that need processing (queued, or re-added while in flight)
//! - **processing** - keys currently held by a worker
//!
//! A key is never handed to two workers at once. Adding a key that is already
//! queued is a no-op; adding a key that is in flight marks it dirty so it is
//! re-queued exactly once when the worker calls [`WorkQueue::done`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lbaas::queue::WorkQueue;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let queue = Arc::new(WorkQueue::<String>::new("LoadBalancer"));
//! queue.add("ns/lb1".to_string());
//!
//! while let Some(key) = queue.get().await {
//!     // reconcile `key` ...
//!     queue.forget(&key);
//!     queue.done(&key);
//! }
//! # }
//! ```

pub mod rate_limiter;

use crate::metrics;
use rate_limiter::{default_controller_rate_limiter, RateLimiter};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

struct QueueState<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    /// Earliest pending delayed add per key
    waiting: HashMap<K, Instant>,
    shutting_down: bool,
}

/// Work queue shared between the event router (producers) and workers (consumers).
pub struct WorkQueue<K> {
    name: String,
    state: Mutex<QueueState<K>>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter<K>>,
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Display + Send + Sync + 'static,
{
    /// Create a queue using the default controller rate limiter.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self::with_rate_limiter(name, Box::new(default_controller_rate_limiter()))
    }

    /// Create a queue with a custom rate limiter.
    #[must_use]
    pub fn with_rate_limiter(name: &str, rate_limiter: Box<dyn RateLimiter<K>>) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                waiting: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            rate_limiter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `key` as needing processing.
    ///
    /// Ignored after [`WorkQueue::shut_down`].
    pub fn add(&self, key: K) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        trace!(queue = %self.name, key = %key, "Adding key");
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        metrics::set_queue_depth(&self.name, state.queue.len());
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key.
    ///
    /// Returns `None` once the queue is shut down; no further keys are handed out
    /// after that point, even if some are still queued.
    pub async fn get(&self) -> Option<K> {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    metrics::set_queue_depth(&self.name, state.queue.len());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark `key` as no longer in flight.
    ///
    /// If the key was re-added while it was being processed, it goes back on the queue.
    pub fn done(&self, key: &K) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            metrics::set_queue_depth(&self.name, state.queue.len());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Add `key` after `delay` has elapsed.
    ///
    /// Repeated delayed adds of the same key keep only the earliest deadline.
    pub fn add_after(self: &Arc<Self>, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let ready_at = Instant::now() + delay;
        {
            let mut state = self.lock();
            if state.shutting_down {
                return;
            }
            match state.waiting.get(&key) {
                Some(existing) if *existing <= ready_at => return,
                _ => {
                    state.waiting.insert(key.clone(), ready_at);
                }
            }
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            let due = {
                let mut state = queue.lock();
                if state.waiting.get(&key) == Some(&ready_at) {
                    state.waiting.remove(&key);
                    true
                } else {
                    false
                }
            };
            if due {
                queue.add(key);
            }
        });
    }

    /// Add `key` after the rate limiter says it is allowed to be retried.
    pub fn add_rate_limited(self: &Arc<Self>, key: K) {
        let delay = self.rate_limiter.when(&key);
        trace!(queue = %self.name, key = %key, delay_ms = delay.as_millis(), "Rate limited requeue");
        self.add_after(key, delay);
    }

    /// Reset the rate limiter's failure count for `key`.
    pub fn forget(&self, key: &K) {
        self.rate_limiter.forget(key);
    }

    /// Number of rate-limited requeues of `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// True when no keys are waiting to be handed out.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop handing out keys and wake every waiting worker.
    pub fn shut_down(&self) {
        let mut state = self.lock();
        state.shutting_down = true;
        state.waiting.clear();
        drop(state);
        self.notify.notify_waiters();
    }

    /// True once [`WorkQueue::shut_down`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Leader election over a shared lock record.
//!
//! Only the process holding the lock runs the controller. The protocol is the
//! standard try-acquire-or-renew loop:
//!
//! 1. Read the record. If there is none, create it naming ourselves.
//! 2. If another identity holds it and its lease has not expired (judged from
//!    the *local* time we first saw the current record, so clock skew between
//!    nodes does not matter), back off.
//! 3. Otherwise write a record naming ourselves, conditioned on the version we
//!    read. A conflicting write means someone else won.
//!
//! While leading, the renewal task retries every `retry_period`; if no renewal
//! succeeds within `renew_deadline` the [`LeaderGuard`] reports the loss and the
//! caller must stop all reconciliation immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use lbaas::leader::{lease::KubeLeaseLock, LeaderElectionConfig, LeaderElector, LeaderOutcome};
//! use std::sync::Arc;
//!
//! # async fn example(client: kube::Client) -> anyhow::Result<()> {
//! let lock = Arc::new(KubeLeaseLock::new(client, "lbaas-system", "lbaas-operator"));
//! let elector = Arc::new(LeaderElector::new(lock, LeaderElectionConfig::new("pod-a"))?);
//! let (_tx, shutdown) = tokio::sync::watch::channel(false);
//!
//! let mut guard = elector.acquire(shutdown).await?;
//! let run_controllers = async { /* ... */ };
//! if guard.run_while_leading(run_controllers).await == LeaderOutcome::Lost {
//!     std::process::exit(1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod lease;
pub mod lock;
#[cfg(test)]
pub mod memory;

use crate::constants::{
    DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RENEW_DEADLINE_SECS,
    DEFAULT_LEASE_RETRY_PERIOD_SECS, LEADER_ACQUIRE_JITTER_FACTOR,
};
use crate::errors::{LeaderElectionError, LockError};
use crate::metrics;
use chrono::{SubsecRound, Utc};
use lock::{LeaderElectionRecord, ResourceLock, VersionedRecord};
use rand::Rng;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Timing and identity of a leader election participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderElectionConfig {
    /// Unique identity of this process (usually the hostname)
    pub identity: String,
    /// How long a non-leader waits after last observing a change before taking over
    pub lease_duration: Duration,
    /// How long the leader keeps retrying a renewal before giving up
    pub renew_deadline: Duration,
    /// Interval between attempts
    pub retry_period: Duration,
}

impl LeaderElectionConfig {
    /// Config with the default 15s/10s/2s timings.
    #[must_use]
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            lease_duration: Duration::from_secs(DEFAULT_LEASE_DURATION_SECS),
            renew_deadline: Duration::from_secs(DEFAULT_LEASE_RENEW_DEADLINE_SECS),
            retry_period: Duration::from_secs(DEFAULT_LEASE_RETRY_PERIOD_SECS),
        }
    }

    /// Check that the timings leave room to renew before the lease expires.
    ///
    /// # Errors
    /// Returns [`LeaderElectionError::InvalidConfig`] for an empty identity or
    /// inconsistent timings
    pub fn validate(&self) -> Result<(), LeaderElectionError> {
        if self.identity.is_empty() {
            return Err(LeaderElectionError::InvalidConfig(
                "identity must not be empty".to_string(),
            ));
        }
        if self.retry_period.is_zero() {
            return Err(LeaderElectionError::InvalidConfig(
                "retry period must be greater than zero".to_string(),
            ));
        }
        if self.lease_duration.as_secs() > u64::from(i32::MAX.unsigned_abs()) {
            return Err(LeaderElectionError::InvalidConfig(format!(
                "lease duration ({:?}) must fit in {} seconds",
                self.lease_duration,
                i32::MAX
            )));
        }
        if self.lease_duration <= self.renew_deadline {
            return Err(LeaderElectionError::InvalidConfig(format!(
                "lease duration ({:?}) must be greater than renew deadline ({:?})",
                self.lease_duration, self.renew_deadline
            )));
        }
        if self.renew_deadline.as_secs_f64()
            <= LEADER_ACQUIRE_JITTER_FACTOR * self.retry_period.as_secs_f64()
        {
            return Err(LeaderElectionError::InvalidConfig(format!(
                "renew deadline ({:?}) must be greater than {LEADER_ACQUIRE_JITTER_FACTOR} x retry period ({:?})",
                self.renew_deadline, self.retry_period
            )));
        }
        Ok(())
    }
}

/// The last record we read, and when we first saw it.
struct Observed {
    record: Option<LeaderElectionRecord>,
    version: Option<String>,
    time: Instant,
}

/// Participant in leader election.
pub struct LeaderElector {
    lock: Arc<dyn ResourceLock>,
    config: LeaderElectionConfig,
    observed: Mutex<Observed>,
}

impl LeaderElector {
    /// Create an elector after validating `config`.
    ///
    /// # Errors
    /// Returns error if the config is invalid
    pub fn new(
        lock: Arc<dyn ResourceLock>,
        config: LeaderElectionConfig,
    ) -> Result<Self, LeaderElectionError> {
        config.validate()?;
        Ok(Self {
            lock,
            config,
            observed: Mutex::new(Observed {
                record: None,
                version: None,
                time: Instant::now(),
            }),
        })
    }

    /// This participant's identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    fn observed(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_observed(&self, current: VersionedRecord) {
        let mut observed = self.observed();
        observed.record = Some(current.record);
        observed.version = Some(current.version);
        observed.time = Instant::now();
    }

    fn lease_duration_secs(&self) -> i32 {
        i32::try_from(self.config.lease_duration.as_secs()).unwrap_or(i32::MAX)
    }

    /// Block until leadership is acquired or `shutdown` flips to `true`.
    ///
    /// # Errors
    /// Returns [`LeaderElectionError::Cancelled`] if shutdown was requested first
    pub async fn acquire(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<LeaderGuard, LeaderElectionError> {
        info!(
            identity = %self.config.identity,
            lock = %self.lock.describe(),
            "Attempting to acquire leader lease"
        );

        loop {
            if *shutdown.borrow() {
                return Err(LeaderElectionError::Cancelled);
            }

            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.config.identity, "Successfully acquired lease");
                    metrics::record_leader_elected(&self.config.identity);
                    return Ok(self.create_guard());
                }
                Ok(false) => {
                    let holder = self
                        .observed()
                        .record
                        .as_ref()
                        .map(|r| r.holder_identity.clone())
                        .unwrap_or_default();
                    debug!(
                        identity = %self.config.identity,
                        holder = %holder,
                        "Lease is held by another participant"
                    );
                }
                Err(e) => {
                    warn!(
                        identity = %self.config.identity,
                        error = %e,
                        "Failed to acquire lease, retrying"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.jittered_retry_period()) => {}
                _ = shutdown.wait_for(|stop| *stop) => return Err(LeaderElectionError::Cancelled),
            }
        }
    }

    fn jittered_retry_period(&self) -> Duration {
        let base = self.config.retry_period.as_secs_f64();
        let extra = rand::rng().random_range(0.0..=LEADER_ACQUIRE_JITTER_FACTOR) * base;
        Duration::from_secs_f64(base + extra)
    }

    fn create_guard(self: &Arc<Self>) -> LeaderGuard {
        let (lost_tx, lost_rx) = oneshot::channel();
        let elector = Arc::clone(self);
        let renew_task = tokio::spawn(async move {
            elector.renew_loop(lost_tx).await;
        });

        LeaderGuard {
            elector: Arc::clone(self),
            renew_task,
            lost_rx: Some(lost_rx),
        }
    }

    /// Try once to take or keep the lock.
    ///
    /// Returns `Ok(false)` when someone else validly holds it or won a race.
    async fn try_acquire_or_renew(&self) -> Result<bool, LockError> {
        let now = Utc::now().trunc_subsecs(6);
        let mut desired = LeaderElectionRecord {
            holder_identity: self.config.identity.clone(),
            lease_duration_seconds: self.lease_duration_secs(),
            acquire_time: Some(now),
            renew_time: Some(now),
            lease_transitions: 0,
        };

        let Some(current) = self.lock.get().await? else {
            return match self.lock.create(&desired).await {
                Ok(created) => {
                    self.set_observed(created);
                    Ok(true)
                }
                Err(LockError::Conflict(_)) => {
                    debug!(identity = %self.config.identity, "Lease creation conflict");
                    Ok(false)
                }
                Err(e) => Err(e),
            };
        };

        let observed_time = {
            let mut observed = self.observed();
            if observed.version.as_deref() != Some(current.version.as_str())
                || observed.record.as_ref() != Some(&current.record)
            {
                observed.record = Some(current.record.clone());
                observed.version = Some(current.version.clone());
                observed.time = Instant::now();
            }
            observed.time
        };

        let held_by_other = !current.record.holder_identity.is_empty()
            && !current.record.is_held_by(&self.config.identity);
        if held_by_other {
            let lease = Duration::from_secs(
                u64::try_from(current.record.lease_duration_seconds).unwrap_or(0),
            );
            if observed_time + lease > Instant::now() {
                return Ok(false);
            }
        }

        if current.record.is_held_by(&self.config.identity) {
            desired.acquire_time = current.record.acquire_time;
            desired.lease_transitions = current.record.lease_transitions;
        } else {
            desired.lease_transitions = current.record.lease_transitions.saturating_add(1);
        }

        match self.lock.update(&desired, &current.version).await {
            Ok(updated) => {
                self.set_observed(updated);
                Ok(true)
            }
            Err(LockError::Conflict(_)) => {
                debug!(identity = %self.config.identity, "Lease update conflict");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Renew until a renewal misses the deadline, then signal loss.
    async fn renew_loop(&self, lost_tx: oneshot::Sender<()>) {
        loop {
            tokio::time::sleep(self.config.retry_period).await;

            let deadline = Instant::now() + self.config.renew_deadline;
            let renewed = tokio::time::timeout_at(deadline, async {
                loop {
                    match self.try_acquire_or_renew().await {
                        Ok(true) => return,
                        Ok(false) => {
                            debug!(identity = %self.config.identity, "Lease renewal rejected");
                        }
                        Err(e) => {
                            warn!(identity = %self.config.identity, error = %e, "Failed to renew lease");
                        }
                    }
                    tokio::time::sleep(self.config.retry_period).await;
                }
            })
            .await;

            if renewed.is_err() {
                error!(
                    identity = %self.config.identity,
                    renew_deadline_secs = self.config.renew_deadline.as_secs(),
                    "Failed to renew lease within deadline, leadership lost"
                );
                metrics::record_leader_lost(&self.config.identity);
                let _ = lost_tx.send(());
                return;
            }

            debug!(identity = %self.config.identity, "Lease renewed");
            metrics::record_leader_renewed();
        }
    }

    /// Clear the holder so a standby can take over without waiting for expiry.
    async fn release(&self) -> Result<(), LockError> {
        let Some(current) = self.lock.get().await? else {
            return Ok(());
        };
        if !current.record.is_held_by(&self.config.identity) {
            debug!(identity = %self.config.identity, "Not the lease holder, nothing to release");
            return Ok(());
        }

        let now = Utc::now().trunc_subsecs(6);
        let released = LeaderElectionRecord {
            holder_identity: String::new(),
            lease_duration_seconds: 1,
            acquire_time: Some(now),
            renew_time: Some(now),
            lease_transitions: current.record.lease_transitions,
        };
        let updated = self.lock.update(&released, &current.version).await?;
        self.set_observed(updated);
        metrics::record_leader_released(&self.config.identity);
        info!(identity = %self.config.identity, "Released leader lease");
        Ok(())
    }
}

/// How work run under a [`LeaderGuard`] ended.
#[derive(Debug, PartialEq, Eq)]
pub enum LeaderOutcome<T> {
    /// The work finished while still leading
    Completed(T),
    /// Leadership was lost first and the work was cancelled
    Lost,
}

/// Handle held by the leader.
///
/// Renewal runs in the background for as long as the guard lives. Dropping
/// the guard stops renewal without releasing the lock; call
/// [`LeaderGuard::release`] on graceful shutdown.
pub struct LeaderGuard {
    elector: Arc<LeaderElector>,
    renew_task: JoinHandle<()>,
    lost_rx: Option<oneshot::Receiver<()>>,
}

impl LeaderGuard {
    /// Resolve when leadership is lost.
    pub async fn lost(&mut self) {
        match self.lost_rx.as_mut() {
            Some(rx) => {
                let _ = rx.await;
                self.lost_rx = None;
            }
            None => futures::future::pending::<()>().await,
        }
    }

    /// Drive `work` until it completes or leadership is lost.
    ///
    /// On loss `work` is dropped before this returns, together with anything
    /// it owns, so no further writes are issued on behalf of this leader.
    pub async fn run_while_leading<F>(&mut self, work: F) -> LeaderOutcome<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.lost() => LeaderOutcome::Lost,
            output = work => LeaderOutcome::Completed(output),
        }
    }

    /// Identity holding this guard.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.elector.identity()
    }

    /// Stop renewing and hand the lock back.
    ///
    /// # Errors
    /// Returns error if the release write fails; the lease then simply expires
    pub async fn release(self) -> Result<(), LockError> {
        self.renew_task.abort();
        self.elector.release().await
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renew_task.abort();
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The `LoadBalancer` controller: informers, work queue and workers.
//!
//! ```text
//! LoadBalancer watch ─┐
//!                     ├─> EventRouter ─> WorkQueue ─> N workers ─> LoadBalancerReconciler
//! Deployment watch  ──┘                     ^
//!                                 resync ───┘
//! ```
//!
//! Workers are only started once both caches have completed their initial
//! list. A periodic resync re-enqueues every cached `LoadBalancer`, so drift
//! is corrected even when no watch event arrives.

use crate::constants::{
    DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_RESYNC_PERIOD_SECS, DEFAULT_WORKER_COUNT,
    KIND_LOAD_BALANCER,
};
use crate::context::Stores;
use crate::crd::LoadBalancer;
use crate::errors::{ControllerError, ReconcileError};
use crate::events::KubeEventPublisher;
use crate::informer::Informer;
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::{KubeClusterClient, LoadBalancerReconciler};
use crate::router::{EventRouter, ObjectKey};
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher;
use kube::{Api, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Tunables of the controller loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub workers: usize,
    pub cache_sync_timeout: Duration,
    pub resync_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            cache_sync_timeout: Duration::from_secs(DEFAULT_CACHE_SYNC_TIMEOUT_SECS),
            resync_period: Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
        }
    }
}

/// Start the informers and run the controller until `shutdown` flips to true.
///
/// `instance` is the pod name reported on published events.
///
/// # Errors
/// Returns [`ControllerError::CacheSyncTimeout`] if the caches do not sync in time
pub async fn run(
    client: Client,
    instance: &str,
    config: ControllerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ControllerError> {
    let lb_informer = Informer::<LoadBalancer>::new(Api::all(client.clone()), watcher::Config::default());
    let deployment_informer =
        Informer::<Deployment>::new(Api::all(client.clone()), watcher::Config::default());
    let stores = Stores::new(lb_informer.store(), deployment_informer.store());

    let queue = Arc::new(WorkQueue::new(KIND_LOAD_BALANCER));
    let router = EventRouter::new(queue.clone(), stores.load_balancers.clone());

    let mut informers = JoinSet::new();
    let lb_router = router.clone();
    informers.spawn(lb_informer.run(
        move |event| lb_router.handle_load_balancer(&event),
        shutdown.clone(),
    ));
    informers.spawn(deployment_informer.run(
        move |event| router.handle_deployment(&event),
        shutdown.clone(),
    ));

    let reconciler = LoadBalancerReconciler::new(
        stores.clone(),
        Arc::new(KubeClusterClient::new(client.clone())),
        Arc::new(KubeEventPublisher::new(client, instance)),
    );

    let result = LoadBalancerController::new(queue, reconciler, stores, config)
        .run(shutdown)
        .await;

    informers.abort_all();
    result
}

/// Work queue consumers plus the periodic resync.
pub struct LoadBalancerController {
    queue: Arc<WorkQueue<String>>,
    reconciler: LoadBalancerReconciler,
    stores: Stores,
    config: ControllerConfig,
}

impl LoadBalancerController {
    #[must_use]
    pub fn new(
        queue: Arc<WorkQueue<String>>,
        reconciler: LoadBalancerReconciler,
        stores: Stores,
        config: ControllerConfig,
    ) -> Self {
        Self {
            queue,
            reconciler,
            stores,
            config,
        }
    }

    /// Wait for the caches, then process keys until `shutdown` flips to true.
    ///
    /// On shutdown the queue stops handing out keys and in-flight
    /// reconciliations are allowed to finish before this returns. Dropping
    /// the returned future instead aborts the workers where they stand.
    ///
    /// # Errors
    /// Returns [`ControllerError::CacheSyncTimeout`] if the caches do not sync in time
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ControllerError> {
        if let Err(e) = self
            .stores
            .wait_for_sync(self.config.cache_sync_timeout)
            .await
        {
            self.queue.shut_down();
            return Err(e);
        }

        info!(workers = self.config.workers, "Starting LoadBalancer workers");
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            let queue = self.queue.clone();
            let reconciler = self.reconciler.clone();
            workers.spawn(async move {
                while process_next_work_item(&queue, &reconciler).await {}
                debug!(worker = id, "Worker stopped");
            });
        }

        let mut resync = tokio::time::interval(self.config.resync_period);
        resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        resync.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = resync.tick() => self.resync(),
            }
        }

        info!("Shutting down LoadBalancer workers");
        self.queue.shut_down();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker task failed");
            }
        }
        Ok(())
    }

    /// Enqueue every cached `LoadBalancer`.
    fn resync(&self) {
        let load_balancers = self.stores.load_balancers.state();
        debug!(count = load_balancers.len(), "Resyncing LoadBalancers");
        for lb in load_balancers {
            self.queue.add(ObjectKey::from_resource(lb.as_ref()).to_string());
        }
    }
}

/// Take one key off the queue and reconcile it.
///
/// Returns false once the queue is shut down.
pub async fn process_next_work_item(
    queue: &Arc<WorkQueue<String>>,
    reconciler: &LoadBalancerReconciler,
) -> bool {
    let Some(key) = queue.get().await else {
        return false;
    };

    let start = Instant::now();
    match reconciler.reconcile(&key).await {
        Ok(()) => {
            queue.forget(&key);
            metrics::record_reconciliation_success(KIND_LOAD_BALANCER, start.elapsed());
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_LOAD_BALANCER, start.elapsed());
            metrics::record_error(KIND_LOAD_BALANCER, e.metric_label());
            handle_error(queue, &key, &e);
        }
    }
    queue.done(&key);
    true
}

fn handle_error(queue: &Arc<WorkQueue<String>>, key: &str, e: &ReconcileError) {
    if !e.is_retryable() {
        error!(key, error = %e, "Dropping key that cannot be reconciled");
        queue.forget(&key.to_string());
        return;
    }

    let requeues = queue.num_requeues(&key.to_string());
    match e {
        ReconcileError::CreateConflict { .. } => {
            info!(key, requeues, error = %e, "Requeueing LoadBalancer");
        }
        _ => warn!(key, requeues, error = %e, "Error reconciling LoadBalancer, requeueing"),
    }
    metrics::record_reconciliation_requeue(KIND_LOAD_BALANCER, e.metric_label());
    queue.add_rate_limited(key.to_string());
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared reflector stores for the `LoadBalancer` controller.
//!
//! The informers write into these stores and everything else only reads them:
//! the event router uses them to resolve owners, and the reconciler uses them
//! as its source of truth for desired and observed state. Lookups are O(1) by
//! namespace and name.

use crate::crd::LoadBalancer;
use crate::errors::ControllerError;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::reflector::{ObjectRef, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Read handles on the controller's watch caches.
#[derive(Clone)]
pub struct Stores {
    pub load_balancers: Store<LoadBalancer>,
    pub deployments: Store<Deployment>,
}

impl Stores {
    #[must_use]
    pub fn new(load_balancers: Store<LoadBalancer>, deployments: Store<Deployment>) -> Self {
        Self {
            load_balancers,
            deployments,
        }
    }

    /// Get a cached `LoadBalancer` by name and namespace.
    #[must_use]
    pub fn get_load_balancer(&self, name: &str, namespace: &str) -> Option<Arc<LoadBalancer>> {
        self.load_balancers
            .get(&ObjectRef::new(name).within(namespace))
    }

    /// Get a cached `Deployment` by name and namespace.
    #[must_use]
    pub fn get_deployment(&self, name: &str, namespace: &str) -> Option<Arc<Deployment>> {
        self.deployments.get(&ObjectRef::new(name).within(namespace))
    }

    /// Wait until both caches have completed their initial list.
    ///
    /// # Errors
    /// Returns [`ControllerError::CacheSyncTimeout`] if either cache is not
    /// ready within `timeout`, or if its writer went away before becoming ready
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<(), ControllerError> {
        debug!(timeout = ?timeout, "Waiting for informer caches to sync");
        let synced = tokio::time::timeout(timeout, async {
            self.load_balancers.wait_until_ready().await?;
            self.deployments.wait_until_ready().await
        })
        .await;

        match synced {
            Ok(Ok(())) => {
                info!(
                    load_balancers = self.load_balancers.state().len(),
                    deployments = self.deployments.state().len(),
                    "Informer caches synced"
                );
                Ok(())
            }
            Ok(Err(_)) | Err(_) => Err(ControllerError::CacheSyncTimeout(timeout)),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `LoadBalancer` reconciliation logic.
//!
//! Drives the cluster toward one owned `Deployment` per `LoadBalancer`, with
//! the requested replica count, and mirrors the `Deployment`'s available
//! replicas into the `LoadBalancer` status.
//!
//! Desired and observed state are read from the reflector stores only. Every
//! write goes through [`ClusterClient`]; a pass over an already converged
//! `LoadBalancer` makes no writes at all.

use super::client::ClusterClient;
use super::deployment::{available_replicas, build_deployment, is_controlled_by, spec_replicas};
use super::status::LoadBalancerStatusUpdater;
use crate::constants::{
    CONDITION_TYPE_READY, KIND_DEPLOYMENT, MESSAGE_RESOURCE_SYNCED, REASON_PROGRESSING,
    REASON_RESOURCE_EXISTS, REASON_SYNCED,
};
use crate::context::Stores;
use crate::crd::LoadBalancer;
use crate::errors::ReconcileError;
use crate::events::{EventPublisher, ACTION_RECONCILE};
use crate::metrics;
use crate::router::split_meta_namespace_key;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconciles `LoadBalancer` work queue keys.
#[derive(Clone)]
pub struct LoadBalancerReconciler {
    stores: Stores,
    client: Arc<dyn ClusterClient>,
    events: Arc<dyn EventPublisher>,
}

impl LoadBalancerReconciler {
    #[must_use]
    pub fn new(
        stores: Stores,
        client: Arc<dyn ClusterClient>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            stores,
            client,
            events,
        }
    }

    /// Reconcile the `LoadBalancer` identified by `key` (`namespace/name`).
    ///
    /// A key whose `LoadBalancer` is no longer cached reconciles to success;
    /// garbage collection removes the owned `Deployment`.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::InvalidKey`] for malformed keys (not retried)
    /// - [`ReconcileError::CreateConflict`] if the `Deployment` appeared concurrently
    /// - [`ReconcileError::OwnershipConflict`] if a foreign `Deployment` holds the name
    /// - [`ReconcileError::Kube`] for any other API failure
    pub async fn reconcile(&self, key: &str) -> Result<(), ReconcileError> {
        let (namespace, name) = split_meta_namespace_key(key)?;

        let Some(lb) = self.stores.get_load_balancer(&name, &namespace) else {
            debug!(key, "LoadBalancer no longer exists, nothing to do");
            return Ok(());
        };

        let deployment_name = lb.deployment_name();
        debug!(
            namespace = %namespace,
            name = %name,
            deployment = %deployment_name,
            generation = ?lb.metadata.generation,
            "Reconciling LoadBalancer"
        );

        let Some(deployment) = self.stores.get_deployment(&deployment_name, &namespace) else {
            return self.create_deployment(&lb, &namespace, &deployment_name).await;
        };

        if !is_controlled_by(&deployment, &lb) {
            return Err(self
                .report_ownership_conflict(&lb, &namespace, &deployment_name)
                .await);
        }

        self.scale_deployment(&lb, &deployment, &namespace, &deployment_name)
            .await?;
        self.update_status(&lb, &deployment).await
    }

    async fn create_deployment(
        &self,
        lb: &LoadBalancer,
        namespace: &str,
        deployment_name: &str,
    ) -> Result<(), ReconcileError> {
        let deployment = build_deployment(lb);
        match self.client.create_deployment(namespace, &deployment).await {
            Ok(()) => {
                info!(
                    namespace,
                    deployment = deployment_name,
                    replicas = lb.desired_replicas(),
                    load_balancer = %lb.name_any(),
                    "Created Deployment for LoadBalancer"
                );
                metrics::record_resource_created(KIND_DEPLOYMENT);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                info!(
                    namespace,
                    deployment = deployment_name,
                    "Deployment already exists, waiting for the cache to catch up"
                );
                Err(ReconcileError::CreateConflict {
                    namespace: namespace.to_string(),
                    name: deployment_name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Emit the warning event and `Ready=False` condition for a foreign `Deployment`.
    ///
    /// Always yields the conflict error; a failed status write is logged and
    /// the key is retried anyway.
    async fn report_ownership_conflict(
        &self,
        lb: &LoadBalancer,
        namespace: &str,
        deployment_name: &str,
    ) -> ReconcileError {
        let message = format!(
            "Resource \"{deployment_name}\" already exists and is not managed by LoadBalancer"
        );
        warn!(
            namespace,
            deployment = deployment_name,
            load_balancer = %lb.name_any(),
            "{message}"
        );

        self.events
            .publish(
                &lb.object_ref(&()),
                EventType::Warning,
                REASON_RESOURCE_EXISTS,
                ACTION_RECONCILE,
                Some(message.clone()),
            )
            .await;

        let mut status = LoadBalancerStatusUpdater::new(lb);
        status.set_condition(CONDITION_TYPE_READY, "False", REASON_RESOURCE_EXISTS, &message);
        if let Err(e) = status.apply(self.client.as_ref()).await {
            warn!(
                namespace,
                load_balancer = %lb.name_any(),
                error = %e,
                "Failed to record ownership conflict in LoadBalancer status"
            );
        }

        ReconcileError::OwnershipConflict {
            namespace: namespace.to_string(),
            name: deployment_name.to_string(),
            owner: lb.name_any(),
        }
    }

    /// Replace the `Deployment` if its replica count differs from the desired one.
    ///
    /// Starts from the cached copy so its `resourceVersion` guards the write.
    /// Available replicas converge later and arrive as `Deployment` events.
    async fn scale_deployment(
        &self,
        lb: &LoadBalancer,
        deployment: &Deployment,
        namespace: &str,
        deployment_name: &str,
    ) -> Result<(), ReconcileError> {
        let desired = lb.desired_replicas();
        let current = spec_replicas(deployment);
        if current == desired {
            return Ok(());
        }

        info!(
            namespace,
            deployment = deployment_name,
            from = current,
            to = desired,
            "Scaling Deployment to match LoadBalancer"
        );

        let mut updated = deployment.clone();
        updated.spec.get_or_insert_with(Default::default).replicas = Some(desired);
        self.client
            .replace_deployment(namespace, deployment_name, &updated)
            .await?;
        metrics::record_resource_updated(KIND_DEPLOYMENT);
        Ok(())
    }

    async fn update_status(
        &self,
        lb: &LoadBalancer,
        deployment: &Deployment,
    ) -> Result<(), ReconcileError> {
        let desired = lb.desired_replicas();
        let available = available_replicas(deployment);

        let mut status = LoadBalancerStatusUpdater::new(lb);
        status.set_available_replicas(available);
        if available >= desired {
            status.set_condition(
                CONDITION_TYPE_READY,
                "True",
                REASON_SYNCED,
                MESSAGE_RESOURCE_SYNCED,
            );
        } else {
            status.set_condition(
                CONDITION_TYPE_READY,
                "False",
                REASON_PROGRESSING,
                &format!("{available} of {desired} replicas available"),
            );
        }

        if status.apply(self.client.as_ref()).await? {
            self.events
                .publish(
                    &lb.object_ref(&()),
                    EventType::Normal,
                    REASON_SYNCED,
                    ACTION_RECONCILE,
                    Some(MESSAGE_RESOURCE_SYNCED.to_string()),
                )
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "loadbalancer_tests.rs"]
mod loadbalancer_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Write side of the reconciler.
//!
//! Reads always come from the reflector stores; every mutating call the
//! reconciler makes goes through [`ClusterClient`], so tests can count and
//! inspect the writes of a reconciliation pass.

use crate::crd::LoadBalancer;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::Value;
use tracing::debug;

/// Mutating Kubernetes calls made by the reconciler.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create a `Deployment`. Fails with 409 if it already exists.
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error>;

    /// Replace a `Deployment`; `deployment.metadata.resourceVersion` is the precondition.
    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error>;

    /// Merge-patch the status subresource of a `LoadBalancer`.
    async fn patch_load_balancer_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), kube::Error>;
}

/// [`ClusterClient`] talking to the API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let created = api.create(&PostParams::default(), deployment).await?;
        debug!(
            namespace,
            name = ?created.metadata.name,
            resource_version = ?created.metadata.resource_version,
            "Created Deployment"
        );
        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let replaced = api
            .replace(name, &PostParams::default(), deployment)
            .await?;
        debug!(
            namespace,
            name,
            resource_version = ?replaced.metadata.resource_version,
            "Replaced Deployment"
        );
        Ok(())
    }

    async fn patch_load_balancer_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), kube::Error> {
        let api: Api<LoadBalancer> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

/// A write captured by [`FakeCluster`].
#[cfg(test)]
#[derive(Clone, Debug, PartialEq)]
pub enum ClusterCall {
    CreateDeployment {
        namespace: String,
        name: String,
        replicas: Option<i32>,
    },
    ReplaceDeployment {
        namespace: String,
        name: String,
        replicas: Option<i32>,
        resource_version: Option<String>,
    },
    PatchStatus {
        namespace: String,
        name: String,
        patch: Value,
    },
}

/// In-memory [`ClusterClient`] recording every call.
///
/// Created `Deployments` are remembered, so a second create of the same name
/// fails with 409 like the API server would.
#[cfg(test)]
#[derive(Default)]
pub struct FakeCluster {
    deployments: std::sync::Mutex<std::collections::BTreeMap<(String, String), Deployment>>,
    calls: std::sync::Mutex<Vec<ClusterCall>>,
    failure: std::sync::Mutex<Option<u16>>,
    latency: std::sync::Mutex<Option<std::time::Duration>>,
}

#[cfg(test)]
impl FakeCluster {
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.deployments
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }

    /// Fail every subsequent call with the given HTTP status code.
    pub fn fail_with(&self, code: Option<u16>) {
        *self.failure.lock().unwrap() = code;
    }

    /// Delay every subsequent call by `latency` before it reaches the cluster.
    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn round_trip(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_failure(&self) -> Result<(), kube::Error> {
        match *self.failure.lock().unwrap() {
            Some(code) => Err(api_error(code, "InjectedFailure")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(Box::new(kube::core::Status {
        status: Some(kube::core::response::StatusSummary::Failure),
        message: format!("{reason} error"),
        reason: reason.to_string(),
        code,
        metadata: None,
        details: None,
    }))
}

#[cfg(test)]
#[async_trait]
impl ClusterClient for FakeCluster {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error> {
        self.round_trip().await;
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.calls.lock().unwrap().push(ClusterCall::CreateDeployment {
            namespace: namespace.to_string(),
            name: name.clone(),
            replicas: deployment.spec.as_ref().and_then(|s| s.replicas),
        });
        self.check_failure()?;

        let mut deployments = self.deployments.lock().unwrap();
        let key = (namespace.to_string(), name);
        if deployments.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists"));
        }
        deployments.insert(key, deployment.clone());
        Ok(())
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        name: &str,
        deployment: &Deployment,
    ) -> Result<(), kube::Error> {
        self.round_trip().await;
        self.calls.lock().unwrap().push(ClusterCall::ReplaceDeployment {
            namespace: namespace.to_string(),
            name: name.to_string(),
            replicas: deployment.spec.as_ref().and_then(|s| s.replicas),
            resource_version: deployment.metadata.resource_version.clone(),
        });
        self.check_failure()?;
        self.deployments
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), deployment.clone());
        Ok(())
    }

    async fn patch_load_balancer_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), kube::Error> {
        self.round_trip().await;
        self.calls.lock().unwrap().push(ClusterCall::PatchStatus {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
        });
        self.check_failure()
    }
}

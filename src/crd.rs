// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for load balancer management.
//!
//! # Resource Types
//!
//! - [`LoadBalancer`] - Declares a pool of load balancer pods, backed by a `Deployment`
//!   that the operator creates and owns.
//!
//! # Example: Creating a `LoadBalancer`
//!
//! ```rust,no_run
//! use lbaas::crd::{LoadBalancer, LoadBalancerSpec};
//!
//! let lb = LoadBalancer::new(
//!     "lb1",
//!     LoadBalancerSpec {
//!         deployment_name: Some("lb1".to_string()),
//!         replicas: Some(2),
//!         image: None,
//!     },
//! );
//! ```

use crate::constants::{DEFAULT_LOAD_BALANCER_IMAGE, DEFAULT_REPLICAS};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Progressing, Degraded.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `LoadBalancer` declares a set of load balancer pods served by a single `Deployment`.
///
/// The operator creates the `Deployment` named by `deploymentName` (or the
/// `LoadBalancer`'s own name), keeps its replica count in line with `replicas`,
/// and reports the number of available pods back in the status.
///
/// # Example
///
/// ```yaml
/// apiVersion: lbpool.lbservice.io/v1alpha1
/// kind: LoadBalancer
/// metadata:
///   name: lb1
///   namespace: ns
/// spec:
///   deploymentName: lb1
///   replicas: 2
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "lbpool.lbservice.io",
    version = "v1alpha1",
    kind = "LoadBalancer",
    namespaced,
    shortname = "lb",
    doc = "LoadBalancer declares a pool of load balancer pods. The operator creates and owns a Deployment for each LoadBalancer and mirrors its available replica count into the status.",
    printcolumn = r#"{"name":"Deployment","type":"string","jsonPath":".spec.deploymentName"}"#,
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "LoadBalancerStatus")]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Name of the backing `Deployment`. Defaults to the `LoadBalancer` name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,

    /// Desired number of load balancer pods. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0, max = 2_147_483_647))]
    pub replicas: Option<i32>,

    /// Container image of the load balancer pods. Defaults to `nginx:latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// `LoadBalancer` status, written only through the status subresource.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// Number of available pods reported by the backing `Deployment`.
    #[serde(default)]
    pub available_replicas: i32,

    /// The `metadata.generation` this status was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl LoadBalancer {
    /// Name of the `Deployment` backing this `LoadBalancer`.
    ///
    /// An absent or empty `deploymentName` falls back to the `LoadBalancer` name.
    #[must_use]
    pub fn deployment_name(&self) -> String {
        match self.spec.deployment_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.name_any(),
        }
    }

    /// Desired replica count, defaulting to [`DEFAULT_REPLICAS`].
    #[must_use]
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_REPLICAS)
    }

    /// Container image for the backing pods.
    #[must_use]
    pub fn image(&self) -> &str {
        match self.spec.image.as_deref() {
            Some(image) if !image.is_empty() => image,
            _ => DEFAULT_LOAD_BALANCER_IMAGE,
        }
    }
}

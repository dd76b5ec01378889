// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for `LoadBalancer` resources.
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Reflector stores track `LoadBalancers` and `Deployments`
//! 2. **Reconcile** - Compare the `LoadBalancer` spec with the cached `Deployment`
//! 3. **Update** - Create or scale the `Deployment` to match
//! 4. **Status** - Report available replicas and a `Ready` condition
//!
//! # Modules
//!
//! - [`loadbalancer`] - The reconciler driven by the work queue
//! - [`deployment`] - Builders for the owned `Deployment` and the ownership check
//! - [`status`] - Condition helpers and the batched status writer
//! - [`client`] - The write-side seam to the API server

pub mod client;
pub mod deployment;
pub mod loadbalancer;
pub mod status;

pub use client::{ClusterClient, KubeClusterClient};
pub use loadbalancer::LoadBalancerReconciler;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # lbaas - LoadBalancer Operator for Kubernetes
//!
//! A leader-elected controller that turns `LoadBalancer` custom resources
//! (`lbpool.lbservice.io/v1alpha1`) into owned `Deployment`s and reports the
//! observed replica availability back on the resource status.
//!
//! ## Modules
//!
//! - [`crd`] - The `LoadBalancer` custom resource
//! - [`leader`] - Lease based leader election
//! - [`informer`] - Watch caches that classify add, update and delete events
//! - [`router`] - Maps watch events onto `namespace/name` work keys
//! - [`queue`] - Deduplicating, rate limited work queue
//! - [`reconcilers`] - Converges one `LoadBalancer` and its `Deployment`
//! - [`controller`] - Wires informers, queue and workers together
//!
//! ## Example
//!
//! ```rust,no_run
//! use lbaas::crd::{LoadBalancer, LoadBalancerSpec};
//! use lbaas::reconcilers::deployment::build_deployment;
//!
//! let lb = LoadBalancer::new(
//!     "web",
//!     LoadBalancerSpec {
//!         deployment_name: Some("web-lb".to_string()),
//!         replicas: Some(3),
//!         image: None,
//!     },
//! );
//! let deployment = build_deployment(&lb);
//! ```

pub mod cli;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod crd_install;
pub mod errors;
pub mod events;
pub mod informer;
pub mod labels;
pub mod leader;
pub mod metrics;
pub mod queue;
pub mod reconcilers;
pub mod router;
pub mod version;

#[cfg(test)]
mod test_fixtures;

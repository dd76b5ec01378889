// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used for resources created by the operator.
//!
//! This module defines standard Kubernetes labels and operator-specific labels
//! to ensure consistency across all resources created by the controller.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_LBAAS: &str = "lbaas";

/// Component value for load balancer workloads
pub const COMPONENT_LOAD_BALANCER: &str = "load-balancer";

/// Value for `app.kubernetes.io/managed-by` on resources owned by a `LoadBalancer`
pub const MANAGED_BY_LOAD_BALANCER: &str = "LoadBalancer";

// ============================================================================
// Selector Labels
// ============================================================================

/// Label key carrying the application name in pod selectors
pub const APP_LABEL: &str = "app";

/// Value of the `app` label on load balancer pods
pub const APP_LABEL_VALUE: &str = "loadbalancer";

/// Label key carrying the owning `LoadBalancer` name in pod selectors
pub const CONTROLLER_LABEL: &str = "controller";

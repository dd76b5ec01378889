// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the LoadBalancer operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `LoadBalancer` CRD
pub const API_GROUP: &str = "lbpool.lbservice.io";

/// API version for the `LoadBalancer` CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "lbpool.lbservice.io/v1alpha1";

/// Kind name for `LoadBalancer` resource
pub const KIND_LOAD_BALANCER: &str = "LoadBalancer";

/// Kind name for `Deployment` resource
pub const KIND_DEPLOYMENT: &str = "Deployment";

/// Full name of the `LoadBalancer` CRD (plural.group)
pub const LOAD_BALANCER_CRD_NAME: &str = "loadbalancers.lbpool.lbservice.io";

// ============================================================================
// Process Environment
// ============================================================================

/// Environment variable holding the namespace of the running pod
pub const ENV_POD_NAMESPACE: &str = "MY_POD_NAMESPACE";

/// Environment variable holding the name of the running pod
pub const ENV_POD_NAME: &str = "MY_POD_NAME";

/// Environment variable used as the leader lock identity
pub const ENV_HOSTNAME: &str = "HOSTNAME";

/// Environment variable selecting the log output format (`json` or `text`)
pub const ENV_LOG_FORMAT: &str = "RUST_LOG_FORMAT";

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Name of the `Lease` used as the leader lock
pub const LEADER_LOCK_NAME: &str = "lbaas-operator";

/// Default leader election lease duration in seconds
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election renew deadline in seconds
pub const DEFAULT_LEASE_RENEW_DEADLINE_SECS: u64 = 10;

/// Default leader election retry period in seconds
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

/// Upper bound of the random extra wait between acquire attempts, as a
/// multiple of the retry period
pub const LEADER_ACQUIRE_JITTER_FACTOR: f64 = 1.2;

// ============================================================================
// Controller Constants
// ============================================================================

/// Name reported as the source of Kubernetes events
pub const CONTROLLER_NAME: &str = "loadbalancer-controller";

/// Default number of concurrent reconcile workers
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// How long to wait for the watch caches to complete their initial list
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 60;

/// Interval at which every cached `LoadBalancer` is re-enqueued
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 30;

/// Default container image for `LoadBalancer` backing pods
pub const DEFAULT_LOAD_BALANCER_IMAGE: &str = "nginx:latest";

/// Default replica count when `spec.replicas` is not set
pub const DEFAULT_REPLICAS: i32 = 1;

/// Container port exposed by the backing pods
pub const LOAD_BALANCER_CONTAINER_PORT: i32 = 80;

// ============================================================================
// Work Queue Rate Limiting
// ============================================================================

/// Base delay of the per-item exponential failure limiter
pub const QUEUE_ITEM_BASE_DELAY_MILLIS: u64 = 5;

/// Maximum delay of the per-item exponential failure limiter
pub const QUEUE_ITEM_MAX_DELAY_SECS: u64 = 1000;

/// Steady-state rate of the overall token bucket (items per second)
pub const QUEUE_BUCKET_QPS: f64 = 10.0;

/// Burst size of the overall token bucket
pub const QUEUE_BUCKET_BURST: u32 = 100;

// ============================================================================
// Events and Conditions
// ============================================================================

/// Condition type reporting overall readiness
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Reason used when the `LoadBalancer` is synced successfully
pub const REASON_SYNCED: &str = "Synced";

/// Reason used while the backing `Deployment` is still rolling out
pub const REASON_PROGRESSING: &str = "Progressing";

/// Reason used when a `Deployment` with the desired name is owned by someone else
pub const REASON_RESOURCE_EXISTS: &str = "ErrResourceExists";

/// Message used when the `LoadBalancer` is synced successfully
pub const MESSAGE_RESOURCE_SYNCED: &str = "LoadBalancer synced successfully";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";

/// Bind address for metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the LoadBalancer operator.
//!
//! This module provides structured errors for:
//! - Reconciliation of a single work queue key
//! - Controller startup and supervision
//! - Leader election and the lock record underneath it
//! - Process configuration read from flags and the environment
//!
//! Reconcile errors decide how the work queue treats a failed key: anything
//! retryable goes back through the rate limiter, everything else is dropped.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a single reconciliation pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The work queue key could not be split into namespace and name
    ///
    /// Keys are produced by the event router, so this only happens on a
    /// programming error. The key is dropped rather than retried.
    #[error("invalid resource key '{key}'")]
    InvalidKey {
        /// The offending key
        key: String,
    },

    /// A `Deployment` with the desired name exists but is controlled by something else
    ///
    /// Surfaced as a warning event and a `Ready=False` condition on the
    /// `LoadBalancer`; retried with backoff in case the foreign object goes away.
    #[error("Deployment '{namespace}/{name}' already exists and is not managed by LoadBalancer '{owner}'")]
    OwnershipConflict {
        /// Namespace of the conflicting `Deployment`
        namespace: String,
        /// Name of the conflicting `Deployment`
        name: String,
        /// The `LoadBalancer` that wanted the name
        owner: String,
    },

    /// Creating the `Deployment` hit 409 because it appeared concurrently
    ///
    /// Another pass (or a lagging cache) already created it. Requeued, never fatal.
    #[error("Deployment '{namespace}/{name}' is already being created")]
    CreateConflict {
        /// Namespace of the `Deployment`
        namespace: String,
        /// Name of the `Deployment`
        name: String,
    },

    /// Any other Kubernetes API failure
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// Failed to (de)serialize an API payload
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Returns true if the key should be requeued through the rate limiter.
    ///
    /// Only malformed keys are permanent: every cluster-side failure (network,
    /// conflicts, stale cache reads, foreign owners) may resolve on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey { .. })
    }

    /// Short label used for the `error_type` metric dimension.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "invalid_key",
            Self::OwnershipConflict { .. } => "ownership_conflict",
            Self::CreateConflict { .. } => "create_conflict",
            Self::Kube(kube::Error::Api(ae)) if ae.code == 409 => "conflict",
            Self::Kube(kube::Error::Api(_)) => "api_error",
            Self::Kube(_) => "network_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

/// Errors that stop the controller as a whole.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The watch caches did not finish their initial list in time
    #[error("timed out after {0:?} waiting for caches to sync")]
    CacheSyncTimeout(Duration),

    /// The `LoadBalancer` CRD could not be installed
    #[error("failed to install CRD '{name}': {source}")]
    CrdInstall {
        /// CRD name
        name: String,
        /// Underlying API error
        #[source]
        source: kube::Error,
    },

    /// The CRD was applied but never reported `Established`
    #[error("CRD '{0}' was not established in time")]
    CrdNotEstablished(String),

    /// The metrics endpoint could not be served
    #[error("metrics server failed: {0}")]
    MetricsServer(#[from] std::io::Error),
}

/// Errors reported by a [`crate::leader::lock::ResourceLock`].
#[derive(Error, Debug)]
pub enum LockError {
    /// The record changed (or was created) since it was last read
    #[error("leader lock '{0}' was modified concurrently")]
    Conflict(String),

    /// Any other failure reaching the record store
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// The stored record could not be decoded
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned while acquiring leadership.
#[derive(Error, Debug)]
pub enum LeaderElectionError {
    /// Invalid combination of lease timings
    #[error("invalid leader election config: {0}")]
    InvalidConfig(String),

    /// Shutdown was requested before the lock was acquired
    #[error("shutdown requested before leadership was acquired")]
    Cancelled,
}

/// Errors raised while assembling the process configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// A flag value is out of range or inconsistent with another
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;

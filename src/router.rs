// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event routing from the watch caches to the work queue.
//!
//! The router turns cache change notifications into work queue keys:
//!
//! - **`LoadBalancer` events** enqueue the `LoadBalancer`'s own key.
//! - **`Deployment` events** are mapped back to the owning `LoadBalancer`
//!   through the `Deployment`'s controller owner reference. Events for
//!   `Deployments` without such a reference, owned by another kind, or whose
//!   owner is not (yet) in the cache are dropped.
//!
//! Keys are plain `namespace/name` strings; the queue carries identity only,
//! and the reconciler always re-reads the cache.

use crate::constants::KIND_LOAD_BALANCER;
use crate::crd::LoadBalancer;
use crate::errors::ReconcileError;
use crate::queue::WorkQueue;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Identity of a namespaced (or cluster-scoped) object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace; `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key of a Kubernetes object.
    pub fn from_resource<K: ResourceExt>(obj: &K) -> Self {
        Self::new(obj.namespace().as_deref(), &obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Split a work queue key into `(namespace, name)`.
///
/// `ns/name` yields `("ns", "name")` and `name` yields `("", "name")`.
///
/// # Errors
/// Returns [`ReconcileError::InvalidKey`] for keys with more than one `/`
/// or an empty name
pub fn split_meta_namespace_key(key: &str) -> Result<(String, String), ReconcileError> {
    let invalid = || ReconcileError::InvalidKey {
        key: key.to_string(),
    };
    let mut parts = key.split('/');
    let (namespace, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) => ("", name),
        (Some(namespace), Some(name), None) => (namespace, name),
        _ => return Err(invalid()),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    Ok((namespace.to_string(), name.to_string()))
}

/// What happened to an object, decided once when the watch event is received.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// First time the cache sees this object
    Added,
    /// The object changed; carries the `resourceVersion` it replaced
    Updated {
        /// `resourceVersion` of the cached copy before this update
        previous_version: Option<String>,
    },
    /// The object was removed from the cache
    Deleted {
        /// True for tombstones: the deletion was missed while disconnected and
        /// only noticed on relist, so the snapshot is the last known state
        final_state_unknown: bool,
    },
}

/// A cache change notification.
#[derive(Clone, Debug)]
pub struct ObjectEvent<K> {
    pub kind: EventKind,
    pub key: ObjectKey,
    /// Current object, or the last known state for deletions
    pub object: Option<Arc<K>>,
}

impl<K: ResourceExt> ObjectEvent<K> {
    /// True for updates that did not change the object's `resourceVersion`.
    #[must_use]
    pub fn is_noop_update(&self) -> bool {
        match (&self.kind, &self.object) {
            (EventKind::Updated { previous_version }, Some(obj)) => {
                previous_version.is_some() && *previous_version == obj.resource_version()
            }
            _ => false,
        }
    }
}

/// Minimal ownership view of a child object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerProjection {
    pub namespace: String,
    pub name: String,
    pub owner_kind: String,
    pub owner_name: String,
}

impl OwnerProjection {
    /// Project the first controller owner reference of `meta`, if any.
    #[must_use]
    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        let owner = meta
            .owner_references
            .as_ref()?
            .iter()
            .find(|owner| owner.controller == Some(true))?;
        Some(Self {
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
            owner_kind: owner.kind.clone(),
            owner_name: owner.name.clone(),
        })
    }

    /// Key of the owner, which lives in the child's namespace.
    #[must_use]
    pub fn owner_key(&self) -> ObjectKey {
        ObjectKey::new(Some(&self.namespace), &self.owner_name)
    }
}

/// Maps cache events onto work queue keys.
#[derive(Clone)]
pub struct EventRouter {
    queue: Arc<WorkQueue<String>>,
    load_balancers: Store<LoadBalancer>,
}

impl EventRouter {
    #[must_use]
    pub fn new(queue: Arc<WorkQueue<String>>, load_balancers: Store<LoadBalancer>) -> Self {
        Self {
            queue,
            load_balancers,
        }
    }

    /// Enqueue the key of a changed `LoadBalancer`.
    ///
    /// Adds, updates and deletes all enqueue; a deleted `LoadBalancer`
    /// reconciles to "nothing to do".
    pub fn handle_load_balancer(&self, event: &ObjectEvent<LoadBalancer>) {
        trace!(key = %event.key, kind = ?event.kind, "LoadBalancer event");
        self.queue.add(event.key.to_string());
    }

    /// Enqueue the owning `LoadBalancer` of a changed `Deployment`.
    pub fn handle_deployment(&self, event: &ObjectEvent<Deployment>) {
        if event.is_noop_update() {
            trace!(key = %event.key, "Skipping Deployment resync with unchanged resourceVersion");
            return;
        }

        let Some(deployment) = event.object.as_deref() else {
            debug!(key = %event.key, kind = ?event.kind, "Dropping Deployment event without a snapshot");
            return;
        };

        if let Some(owner) = self.resolve_owner(&deployment.metadata) {
            debug!(deployment = %event.key, owner = %owner, kind = ?event.kind, "Enqueueing owner of Deployment");
            self.queue.add(owner);
        }
    }

    /// Resolve a child's controller owner to a cached `LoadBalancer` key.
    #[must_use]
    pub fn resolve_owner(&self, meta: &ObjectMeta) -> Option<String> {
        let projection = OwnerProjection::from_meta(meta)?;
        if projection.owner_kind != KIND_LOAD_BALANCER {
            trace!(
                deployment = %projection.name,
                owner_kind = %projection.owner_kind,
                "Ignoring Deployment owned by another kind"
            );
            return None;
        }

        let owner_ref =
            ObjectRef::<LoadBalancer>::new(&projection.owner_name).within(&projection.namespace);
        if self.load_balancers.get(&owner_ref).is_none() {
            debug!(
                namespace = %projection.namespace,
                deployment = %projection.name,
                owner = %projection.owner_name,
                "Ignoring orphaned Deployment, owner LoadBalancer not found"
            );
            return None;
        }

        Some(projection.owner_key().to_string())
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod router_tests;

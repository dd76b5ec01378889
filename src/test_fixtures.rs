// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared builders for unit tests.

use crate::crd::{LoadBalancer, LoadBalancerSpec, LoadBalancerStatus};
use crate::reconcilers::deployment::build_deployment;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::reflector::{self, store::Writer, Lookup, Store};
use kube::runtime::watcher;
use std::hash::Hash;

pub const TEST_NAMESPACE: &str = "ns";

/// A cached `LoadBalancer` as the API server would return it.
pub fn load_balancer(name: &str, deployment_name: Option<&str>, replicas: Option<i32>) -> LoadBalancer {
    let mut lb = LoadBalancer::new(
        name,
        LoadBalancerSpec {
            deployment_name: deployment_name.map(str::to_string),
            replicas,
            image: None,
        },
    );
    lb.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    lb.metadata.uid = Some(format!("uid-{name}"));
    lb.metadata.resource_version = Some("100".to_string());
    lb.metadata.generation = Some(1);
    lb
}

/// Attach a status to a `LoadBalancer`.
pub fn with_status(mut lb: LoadBalancer, status: LoadBalancerStatus) -> LoadBalancer {
    lb.status = Some(status);
    lb
}

/// A `Deployment` created by `lb`, reporting `available` ready replicas.
pub fn owned_deployment(lb: &LoadBalancer, replicas: i32, available: i32) -> Deployment {
    let mut deployment = build_deployment(lb);
    deployment.metadata.resource_version = Some("200".to_string());
    if let Some(spec) = deployment.spec.as_mut() {
        spec.replicas = Some(replicas);
    }
    deployment.status = Some(DeploymentStatus {
        available_replicas: Some(available),
        ..Default::default()
    });
    deployment
}

/// A `Deployment` nobody in this operator owns.
pub fn foreign_deployment(name: &str) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            resource_version: Some("300".to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A `Deployment` controlled by an arbitrary owner.
pub fn deployment_owned_by(name: &str, owner_kind: &str, owner_name: &str) -> Deployment {
    let mut deployment = foreign_deployment(name);
    deployment.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: owner_kind.to_string(),
        name: owner_name.to_string(),
        uid: format!("uid-{owner_name}"),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]);
    deployment
}

/// A synced store holding `objects`, with its writer for later changes.
pub fn synced_store<K>(objects: Vec<K>) -> (Store<K>, Writer<K>)
where
    K: Lookup + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    let (store, mut writer) = reflector::store::<K>();
    writer.apply_watcher_event(&watcher::Event::Init);
    for object in objects {
        writer.apply_watcher_event(&watcher::Event::InitApply(object));
    }
    writer.apply_watcher_event(&watcher::Event::InitDone);
    (store, writer)
}

/// Insert or replace an object in a store.
pub fn upsert<K>(writer: &mut Writer<K>, object: K)
where
    K: Lookup + Clone + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    writer.apply_watcher_event(&watcher::Event::Apply(object));
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Builders for the `Deployment` backing a `LoadBalancer`, and the ownership
//! check that decides whether the controller may touch an existing one.

use crate::constants::{API_GROUP_VERSION, KIND_LOAD_BALANCER, LOAD_BALANCER_CONTAINER_PORT};
use crate::crd::LoadBalancer;
use crate::labels::{
    APP_LABEL, APP_LABEL_VALUE, COMPONENT_LOAD_BALANCER, CONTROLLER_LABEL, K8S_COMPONENT,
    K8S_INSTANCE, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_LOAD_BALANCER, PART_OF_LBAAS,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Labels for the `Deployment`, its selector and its pod template.
///
/// Every value derives from the `LoadBalancer` name, so the selector stays
/// stable across spec changes.
#[must_use]
pub fn build_labels(lb: &LoadBalancer) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([
        (APP_LABEL.to_string(), APP_LABEL_VALUE.to_string()),
        (CONTROLLER_LABEL.to_string(), lb.name_any()),
    ]);
    labels.insert(K8S_NAME.to_string(), APP_LABEL_VALUE.to_string());
    labels.insert(K8S_INSTANCE.to_string(), lb.name_any());
    labels.insert(K8S_COMPONENT.to_string(), COMPONENT_LOAD_BALANCER.to_string());
    labels.insert(K8S_MANAGED_BY.to_string(), MANAGED_BY_LOAD_BALANCER.to_string());
    labels.insert(K8S_PART_OF.to_string(), PART_OF_LBAAS.to_string());
    labels
}

/// Controller owner reference pointing at `lb`.
///
/// Lets the garbage collector delete the `Deployment` with its `LoadBalancer`,
/// and lets the event router map `Deployment` events back to it.
#[must_use]
pub fn build_owner_references(lb: &LoadBalancer) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_LOAD_BALANCER.to_string(),
        name: lb.name_any(),
        uid: lb.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Build the `Deployment` a `LoadBalancer` asks for.
#[must_use]
pub fn build_deployment(lb: &LoadBalancer) -> Deployment {
    let name = lb.deployment_name();
    let namespace = lb.namespace().unwrap_or_default();
    let replicas = lb.desired_replicas();
    debug!(
        name = %name,
        namespace = %namespace,
        replicas,
        "Building Deployment for LoadBalancer"
    );

    let labels = build_labels(lb);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            owner_references: Some(build_owner_references(lb)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: APP_LABEL_VALUE.to_string(),
                        image: Some(lb.image().to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: LOAD_BALANCER_CONTAINER_PORT,
                            name: Some("http".to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// True if `deployment`'s controller owner reference points at `lb`.
///
/// Kind and name must match; the UID must match too when both sides carry
/// one, so a `Deployment` left over from a deleted `LoadBalancer` of the same
/// name is treated as foreign.
#[must_use]
pub fn is_controlled_by(deployment: &Deployment, lb: &LoadBalancer) -> bool {
    let Some(owner) = deployment
        .metadata
        .owner_references
        .as_ref()
        .and_then(|refs| refs.iter().find(|r| r.controller == Some(true)))
    else {
        return false;
    };

    if owner.kind != KIND_LOAD_BALANCER || owner.name != lb.name_any() {
        return false;
    }

    match lb.metadata.uid.as_deref() {
        Some(uid) if !owner.uid.is_empty() => owner.uid == uid,
        _ => true,
    }
}

/// Replica count in the `Deployment` spec (1 when unset, as the API server defaults it).
#[must_use]
pub fn spec_replicas(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1)
}

/// Available replicas reported by the `Deployment` status.
#[must_use]
pub fn available_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|status| status.available_replicas)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "deployment_tests.rs"]
mod deployment_tests;

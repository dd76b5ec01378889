// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status helpers for `LoadBalancer` resources.
//!
//! Conditions follow the standard Kubernetes format:
//! - `type`: The aspect of the resource being reported (`Ready`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last flipped
//!
//! Status is collected in memory by [`LoadBalancerStatusUpdater`] and written
//! in a single merge patch of the status subresource, only when it differs
//! semantically from what the cache holds. Timestamps alone never cause a write.

use super::client::ClusterClient;
use crate::crd::{Condition, LoadBalancer, LoadBalancerStatus};
use crate::errors::ReconcileError;
use chrono::Utc;
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::debug;

/// Create a new condition stamped with the current time.
///
/// # Example
///
/// ```rust,no_run
/// # use lbaas::reconcilers::status::create_condition;
/// let condition = create_condition("Ready", "True", "Synced", "LoadBalancer synced successfully");
/// assert_eq!(condition.r#type, "Ready");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place.
///
/// `lastTransitionTime` is kept when the status value does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// True if both lists carry the same type, status, reason and message per condition.
///
/// `lastTransitionTime` is ignored.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Collects status changes for one `LoadBalancer` during a reconciliation pass.
///
/// ```rust,ignore
/// let mut updater = LoadBalancerStatusUpdater::new(&lb);
/// updater.set_available_replicas(2);
/// updater.set_condition("Ready", "True", "Synced", "LoadBalancer synced successfully");
/// let written = updater.apply(client.as_ref()).await?;
/// ```
pub struct LoadBalancerStatusUpdater {
    namespace: String,
    name: String,
    resource_version: Option<String>,
    current_status: Option<LoadBalancerStatus>,
    new_status: LoadBalancerStatus,
}

impl LoadBalancerStatusUpdater {
    /// Start from the cached status of `lb`, with `observedGeneration` set to its generation.
    #[must_use]
    pub fn new(lb: &LoadBalancer) -> Self {
        let current_status = lb.status.clone();
        let mut new_status = current_status.clone().unwrap_or_default();
        new_status.observed_generation = lb.metadata.generation;

        Self {
            namespace: lb.namespace().unwrap_or_default(),
            name: lb.name_any(),
            resource_version: lb.resource_version(),
            current_status,
            new_status,
        }
    }

    pub fn set_available_replicas(&mut self, available: i32) {
        self.new_status.available_replicas = available;
    }

    /// Update or add a condition (in memory only).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// True if the collected status differs semantically from the cached one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => {
                current.available_replicas != self.new_status.available_replicas
                    || current.observed_generation != self.new_status.observed_generation
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> &LoadBalancerStatus {
        &self.new_status
    }

    /// Merge patch for the status subresource.
    ///
    /// Carries the cached `resourceVersion`, so the write fails with 409 if the
    /// `LoadBalancer` changed since it was read.
    ///
    /// # Errors
    /// Returns error if the status cannot be serialized
    pub fn patch(&self) -> Result<Value, ReconcileError> {
        let mut patch = json!({ "status": serde_json::to_value(&self.new_status)? });
        if let Some(resource_version) = &self.resource_version {
            patch["metadata"] = json!({ "resourceVersion": resource_version });
        }
        Ok(patch)
    }

    /// Write the status if it changed. Returns true if a patch was sent.
    ///
    /// # Errors
    /// Returns error if the patch cannot be built or the API call fails
    pub async fn apply(&self, client: &dyn ClusterClient) -> Result<bool, ReconcileError> {
        if !self.has_changes() {
            debug!(
                namespace = %self.namespace,
                name = %self.name,
                "LoadBalancer status unchanged, skipping update"
            );
            return Ok(false);
        }

        client
            .patch_load_balancer_status(&self.namespace, &self.name, &self.patch()?)
            .await?;

        debug!(
            namespace = %self.namespace,
            name = %self.name,
            available_replicas = self.new_status.available_replicas,
            conditions = self.new_status.conditions.len(),
            "Updated LoadBalancer status"
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

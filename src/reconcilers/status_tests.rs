// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{Condition, LoadBalancerStatus};
    use crate::reconcilers::client::{ClusterCall, FakeCluster};
    use crate::reconcilers::status::{
        conditions_equal, create_condition, find_condition, update_condition_in_memory,
        LoadBalancerStatusUpdater,
    };
    use crate::test_fixtures::{load_balancer, with_status};

    const CONDITION_TYPE_READY: &str = "Ready";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    fn ready(status: &str, reason: &str, message: &str) -> Condition {
        Condition {
            r#type: CONDITION_TYPE_READY.to_string(),
            status: status.to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            last_transition_time: Some("2025-01-01T00:00:00+00:00".to_string()),
        }
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE_READY, STATUS_TRUE, "Synced", "ok");

        assert_eq!(condition.r#type, CONDITION_TYPE_READY);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason, Some("Synced".to_string()));
        assert_eq!(condition.message, Some("ok".to_string()));

        let timestamp = condition.last_transition_time.as_ref().unwrap();
        assert!(timestamp.contains('T'));
    }

    #[test]
    fn test_update_condition_preserves_transition_time() {
        let mut conditions = vec![ready(STATUS_TRUE, "Synced", "old message")];

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_READY,
            STATUS_TRUE,
            "Synced",
            "new message",
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("new message"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00"),
            "Same status must keep the transition time"
        );
    }

    #[test]
    fn test_update_condition_bumps_transition_time_on_flip() {
        let mut conditions = vec![ready(STATUS_TRUE, "Synced", "ok")];

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE_READY,
            STATUS_FALSE,
            "ErrResourceExists",
            "conflict",
        );

        assert_eq!(conditions[0].status, STATUS_FALSE);
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_update_condition_appends_new_type() {
        let mut conditions = Vec::new();
        update_condition_in_memory(&mut conditions, "Ready", STATUS_TRUE, "Synced", "ok");
        assert!(find_condition(&conditions, "Ready").is_some());
        assert!(find_condition(&conditions, "Degraded").is_none());
    }

    #[test]
    fn test_conditions_equal_ignores_time() {
        let a = vec![ready(STATUS_TRUE, "Synced", "ok")];
        let mut b = a.clone();
        b[0].last_transition_time = Some("2030-01-01T00:00:00+00:00".to_string());
        assert!(conditions_equal(&a, &b));

        b[0].reason = Some("Progressing".to_string());
        assert!(!conditions_equal(&a, &b));
        assert!(!conditions_equal(&a, &[]));
    }

    #[test]
    fn test_updater_detects_first_status() {
        let lb = load_balancer("lb1", None, Some(2));
        let mut updater = LoadBalancerStatusUpdater::new(&lb);
        updater.set_available_replicas(0);
        assert!(updater.has_changes(), "Missing status is always a change");
        assert_eq!(updater.status().observed_generation, Some(1));
    }

    #[test]
    fn test_updater_no_changes() {
        let lb = with_status(
            load_balancer("lb1", None, Some(2)),
            LoadBalancerStatus {
                available_replicas: 2,
                observed_generation: Some(1),
                conditions: vec![ready(STATUS_TRUE, "Synced", "ok")],
            },
        );

        let mut updater = LoadBalancerStatusUpdater::new(&lb);
        updater.set_available_replicas(2);
        updater.set_condition(CONDITION_TYPE_READY, STATUS_TRUE, "Synced", "ok");
        assert!(!updater.has_changes());

        updater.set_available_replicas(1);
        assert!(updater.has_changes());
    }

    #[test]
    fn test_patch_carries_resource_version() {
        let lb = load_balancer("lb1", None, Some(3));
        let mut updater = LoadBalancerStatusUpdater::new(&lb);
        updater.set_available_replicas(2);

        let patch = updater.patch().unwrap();
        assert_eq!(patch["metadata"]["resourceVersion"], "100");
        assert_eq!(patch["status"]["availableReplicas"], 2);
        assert!(patch.get("spec").is_none(), "Status patch must never touch spec");
    }

    #[tokio::test]
    async fn test_apply_skips_unchanged_status() {
        let lb = with_status(
            load_balancer("lb1", None, Some(1)),
            LoadBalancerStatus {
                available_replicas: 1,
                observed_generation: Some(1),
                conditions: vec![],
            },
        );
        let cluster = FakeCluster::default();

        let updater = LoadBalancerStatusUpdater::new(&lb);
        assert!(!updater.apply(&cluster).await.unwrap());
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_apply_patches_changed_status() {
        let lb = load_balancer("lb1", None, Some(1));
        let cluster = FakeCluster::default();

        let mut updater = LoadBalancerStatusUpdater::new(&lb);
        updater.set_available_replicas(1);
        assert!(updater.apply(&cluster).await.unwrap());

        let calls = cluster.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            ClusterCall::PatchStatus { namespace, name, .. } if namespace == "ns" && name == "lb1"
        ));
    }
}

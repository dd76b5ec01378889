// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for controller.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::events::RecordingEventPublisher;
    use crate::leader::lock::ResourceLock;
    use crate::leader::memory::InMemoryLock;
    use crate::leader::{LeaderElectionConfig, LeaderElector, LeaderOutcome};
    use crate::reconcilers::client::{ClusterCall, FakeCluster};
    use crate::test_fixtures::{load_balancer, synced_store};
    use kube::runtime::reflector;

    fn reconciler_for(lbs: Vec<LoadBalancer>, cluster: &Arc<FakeCluster>) -> (LoadBalancerReconciler, Stores) {
        let (lb_store, lb_writer) = synced_store(lbs);
        let (dep_store, dep_writer) = synced_store::<Deployment>(vec![]);
        // Keep the caches alive for the whole test.
        std::mem::forget(lb_writer);
        std::mem::forget(dep_writer);
        let stores = Stores::new(lb_store, dep_store);
        let reconciler = LoadBalancerReconciler::new(
            stores.clone(),
            cluster.clone(),
            Arc::new(RecordingEventPublisher::default()),
        );
        (reconciler, stores)
    }

    fn creates(cluster: &FakeCluster) -> usize {
        cluster
            .calls()
            .iter()
            .filter(|c| matches!(c, ClusterCall::CreateDeployment { .. }))
            .count()
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.cache_sync_timeout, Duration::from_secs(60));
        assert_eq!(config.resync_period, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_success_forgets_key() {
        let cluster = Arc::new(FakeCluster::default());
        let (reconciler, _stores) = reconciler_for(vec![load_balancer("lb1", None, None)], &cluster);
        let queue = Arc::new(WorkQueue::new("test"));

        queue.add("ns/lb1".to_string());
        assert!(process_next_work_item(&queue, &reconciler).await);

        assert_eq!(creates(&cluster), 1);
        assert_eq!(queue.num_requeues(&"ns/lb1".to_string()), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_retryable_error_is_rate_limited() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.fail_with(Some(503));
        let (reconciler, _stores) = reconciler_for(vec![load_balancer("lb1", None, None)], &cluster);
        let queue = Arc::new(WorkQueue::new("test"));

        queue.add("ns/lb1".to_string());
        assert!(process_next_work_item(&queue, &reconciler).await);

        assert_eq!(queue.num_requeues(&"ns/lb1".to_string()), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_is_dropped() {
        let cluster = Arc::new(FakeCluster::default());
        let (reconciler, _stores) = reconciler_for(vec![], &cluster);
        let queue = Arc::new(WorkQueue::new("test"));

        queue.add("a/b/c".to_string());
        assert!(process_next_work_item(&queue, &reconciler).await);

        assert_eq!(queue.num_requeues(&"a/b/c".to_string()), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.is_empty(), "Invalid keys must not come back");
    }

    #[tokio::test]
    async fn test_returns_false_after_shutdown() {
        let cluster = Arc::new(FakeCluster::default());
        let (reconciler, _stores) = reconciler_for(vec![], &cluster);
        let queue = Arc::new(WorkQueue::<String>::new("test"));

        queue.shut_down();
        assert!(!process_next_work_item(&queue, &reconciler).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reconciles_and_stops_on_shutdown() {
        let cluster = Arc::new(FakeCluster::default());
        let (reconciler, stores) = reconciler_for(vec![load_balancer("lb1", None, Some(2))], &cluster);
        let queue = Arc::new(WorkQueue::new("test"));
        let (tx, rx) = watch::channel(false);

        let controller =
            LoadBalancerController::new(queue.clone(), reconciler, stores, ControllerConfig::default());
        let handle = tokio::spawn(controller.run(rx));

        queue.add("ns/lb1".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(creates(&cluster), 1);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert!(queue.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_enqueues_cached_load_balancers() {
        let cluster = Arc::new(FakeCluster::default());
        let (reconciler, stores) = reconciler_for(vec![load_balancer("lb1", None, None)], &cluster);
        let queue = Arc::new(WorkQueue::new("test"));
        let (tx, rx) = watch::channel(false);

        let controller =
            LoadBalancerController::new(queue, reconciler, stores, ControllerConfig::default());
        let handle = tokio::spawn(controller.run(rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(creates(&cluster), 0, "Nothing happens before the first resync");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(creates(&cluster), 1);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_sync_timeout_is_fatal() {
        let cluster = Arc::new(FakeCluster::default());
        let (lbs, _lb_writer) = reflector::store::<LoadBalancer>();
        let (deps, _dep_writer) = reflector::store::<Deployment>();
        let stores = Stores::new(lbs, deps);
        let reconciler = LoadBalancerReconciler::new(
            stores.clone(),
            cluster,
            Arc::new(RecordingEventPublisher::default()),
        );
        let queue = Arc::new(WorkQueue::new("test"));
        let (_tx, rx) = watch::channel(false);

        let err = LoadBalancerController::new(queue.clone(), reconciler, stores, ControllerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::CacheSyncTimeout(_)));
        assert!(queue.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_writes_after_leadership_lost() {
        let lock = Arc::new(InMemoryLock::default());
        let record_store: Arc<dyn ResourceLock> = lock.clone();
        let elector =
            Arc::new(LeaderElector::new(record_store, LeaderElectionConfig::new("pod-a")).unwrap());
        let (_tx, rx) = watch::channel(false);
        let mut guard = elector.acquire(rx.clone()).await.unwrap();

        let cluster = Arc::new(FakeCluster::default());
        cluster.set_latency(Some(Duration::from_secs(3)));
        let lbs = (0..20)
            .map(|i| load_balancer(&format!("lb{i}"), None, None))
            .collect();
        let (reconciler, stores) = reconciler_for(lbs, &cluster);
        let queue = Arc::new(WorkQueue::new("test"));
        for i in 0..20 {
            queue.add(format!("ns/lb{i}"));
        }

        lock.set_unavailable(true);
        let controller =
            LoadBalancerController::new(queue.clone(), reconciler, stores, ControllerConfig::default());
        let outcome = guard.run_while_leading(controller.run(rx)).await;

        assert!(matches!(outcome, LeaderOutcome::Lost));
        assert!(!queue.is_empty(), "Keys should still be waiting when leadership is lost");
        let writes_at_loss = cluster.calls().len();
        assert!(writes_at_loss > 0, "Workers should have been reconciling before the loss");

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(
            cluster.calls().len(),
            writes_at_loss,
            "No write may reach the cluster after leadership is lost"
        );
    }
}

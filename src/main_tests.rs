// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - signal handling and graceful shutdown

#[cfg(test)]
mod tests {
    use super::super::forward_shutdown;
    use std::time::Duration as StdDuration;
    use tokio::sync::{oneshot, watch};
    use tokio::time::timeout;

    /// Test that SIGTERM signal handler can be created on Unix platforms
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        let result = signal(SignalKind::terminate());
        assert!(
            result.is_ok(),
            "Should be able to create SIGTERM signal handler"
        );
    }

    #[tokio::test]
    async fn test_forward_shutdown_flips_channel_after_signal() {
        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let (tx, mut rx) = watch::channel(false);

        let task = tokio::spawn(forward_shutdown(
            async move {
                let _ = signal_rx.await;
            },
            tx,
        ));

        tokio::task::yield_now().await;
        assert!(!*rx.borrow(), "No shutdown before the signal fires");

        signal_tx.send(()).unwrap();
        timeout(StdDuration::from_secs(1), rx.wait_for(|stop| *stop))
            .await
            .expect("shutdown should be signalled")
            .unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_shutdown_tolerates_dropped_receivers() {
        let (tx, rx) = watch::channel(false);
        drop(rx);

        timeout(StdDuration::from_secs(1), forward_shutdown(async {}, tx))
            .await
            .expect("forwarding must not block without receivers");
    }
}

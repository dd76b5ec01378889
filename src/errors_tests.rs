// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use super::super::ReconcileError;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("{reason} error"),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    /// Test that only invalid keys are dropped without a retry
    #[test]
    fn test_retryable_classification() {
        assert!(!ReconcileError::InvalidKey {
            key: "a/b/c".to_string()
        }
        .is_retryable());

        assert!(ReconcileError::OwnershipConflict {
            namespace: "ns".to_string(),
            name: "lb1".to_string(),
            owner: "lb1".to_string(),
        }
        .is_retryable());

        assert!(
            ReconcileError::CreateConflict {
                namespace: "ns".to_string(),
                name: "lb1".to_string(),
            }
            .is_retryable(),
            "Create races must be requeued, not treated as terminal"
        );

        assert!(ReconcileError::from(api_error(500, "InternalError")).is_retryable());
        assert!(
            ReconcileError::from(api_error(404, "NotFound")).is_retryable(),
            "NotFound from a stale cache read should be retried"
        );
    }

    /// Test metric labels for each error category
    #[test]
    fn test_metric_labels() {
        assert_eq!(
            ReconcileError::from(api_error(409, "Conflict")).metric_label(),
            "conflict"
        );
        assert_eq!(
            ReconcileError::from(api_error(503, "ServiceUnavailable")).metric_label(),
            "api_error"
        );
        assert_eq!(
            ReconcileError::InvalidKey {
                key: String::new()
            }
            .metric_label(),
            "invalid_key"
        );
    }

    /// Test that the ownership conflict message names the Deployment
    #[test]
    fn test_ownership_conflict_display() {
        let err = ReconcileError::OwnershipConflict {
            namespace: "ns".to_string(),
            name: "backend".to_string(),
            owner: "lb1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ns/backend"), "Message should include key: {msg}");
        assert!(msg.contains("lb1"));
    }
}

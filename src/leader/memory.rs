// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ResourceLock`] for exercising leader election without a cluster.

use super::lock::{LeaderElectionRecord, ResourceLock, VersionedRecord};
use crate::errors::LockError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Shared lock record with a monotonically increasing version.
#[derive(Default)]
pub struct InMemoryLock {
    state: Mutex<Option<(LeaderElectionRecord, u64)>>,
    unavailable: AtomicBool,
}

impl InMemoryLock {
    /// Make every call fail as if the API server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current record, if any.
    pub fn record(&self) -> Option<LeaderElectionRecord> {
        self.state
            .lock()
            .unwrap()
            .as_ref()
            .map(|(record, _)| record.clone())
    }

    fn check_available(&self) -> Result<(), LockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LockError::Kube(kube::Error::Api(Box::new(kube::core::Status {
                status: Some(kube::core::response::StatusSummary::Failure),
                message: "service unavailable".to_string(),
                reason: "ServiceUnavailable".to_string(),
                code: 503,
                metadata: None,
                details: None,
            }))));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceLock for InMemoryLock {
    async fn get(&self) -> Result<Option<VersionedRecord>, LockError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .as_ref()
            .map(|(record, version)| VersionedRecord {
                record: record.clone(),
                version: version.to_string(),
            }))
    }

    async fn create(&self, record: &LeaderElectionRecord) -> Result<VersionedRecord, LockError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state.is_some() {
            return Err(LockError::Conflict(self.describe()));
        }
        *state = Some((record.clone(), 1));
        Ok(VersionedRecord {
            record: record.clone(),
            version: "1".to_string(),
        })
    }

    async fn update(
        &self,
        record: &LeaderElectionRecord,
        version: &str,
    ) -> Result<VersionedRecord, LockError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        match state.as_ref() {
            Some((_, current)) if current.to_string() == version => {
                let next = current + 1;
                *state = Some((record.clone(), next));
                Ok(VersionedRecord {
                    record: record.clone(),
                    version: next.to_string(),
                })
            }
            _ => Err(LockError::Conflict(self.describe())),
        }
    }

    fn describe(&self) -> String {
        "memory/test-lock".to_string()
    }
}

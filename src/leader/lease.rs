// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ResourceLock`] backed by a `coordination.k8s.io/v1` `Lease`.
//!
//! The lease's `resourceVersion` is the lock version: `replace` with a stale
//! version is rejected by the API server with 409, which maps to
//! [`LockError::Conflict`].

use super::lock::{LeaderElectionRecord, ResourceLock, VersionedRecord};
use crate::errors::LockError;
use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;

/// Leader lock stored in a namespaced `Lease`.
pub struct KubeLeaseLock {
    api: Api<Lease>,
    name: String,
    namespace: String,
}

impl KubeLeaseLock {
    #[must_use]
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    fn to_lease(&self, record: &LeaderElectionRecord, version: Option<&str>) -> Result<Lease, LockError> {
        Ok(Lease {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version: version.map(str::to_string),
                ..Default::default()
            },
            spec: Some(record_to_spec(record)?),
        })
    }

    fn versioned(lease: Lease) -> Result<VersionedRecord, LockError> {
        let record = match &lease.spec {
            Some(spec) => spec_to_record(spec)?,
            None => LeaderElectionRecord::default(),
        };
        Ok(VersionedRecord {
            record,
            version: lease.metadata.resource_version.unwrap_or_default(),
        })
    }
}

/// Convert a lock record into a `LeaseSpec`.
///
/// # Errors
/// Returns error if the record cannot be represented as a `LeaseSpec`
pub fn record_to_spec(record: &LeaderElectionRecord) -> Result<LeaseSpec, LockError> {
    Ok(serde_json::from_value(serde_json::to_value(record)?)?)
}

/// Convert a `LeaseSpec` into a lock record.
///
/// # Errors
/// Returns error if the spec's timestamps cannot be parsed
pub fn spec_to_record(spec: &LeaseSpec) -> Result<LeaderElectionRecord, LockError> {
    Ok(serde_json::from_value(serde_json::to_value(spec)?)?)
}

#[async_trait]
impl ResourceLock for KubeLeaseLock {
    async fn get(&self) -> Result<Option<VersionedRecord>, LockError> {
        match self.api.get_opt(&self.name).await? {
            Some(lease) => Ok(Some(Self::versioned(lease)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, record: &LeaderElectionRecord) -> Result<VersionedRecord, LockError> {
        let lease = self.to_lease(record, None)?;
        match self.api.create(&PostParams::default(), &lease).await {
            Ok(created) => Self::versioned(created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(LockError::Conflict(self.describe())),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        record: &LeaderElectionRecord,
        version: &str,
    ) -> Result<VersionedRecord, LockError> {
        let lease = self.to_lease(record, Some(version))?;
        match self
            .api
            .replace(&self.name, &PostParams::default(), &lease)
            .await
        {
            Ok(updated) => Self::versioned(updated),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(LockError::Conflict(self.describe())),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

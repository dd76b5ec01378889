// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The leader lock record and the store it lives in.
//!
//! A [`ResourceLock`] is a compare-and-swap store for a single
//! [`LeaderElectionRecord`]. Every write carries the version that was read;
//! if the record changed in between, the store answers
//! [`LockError::Conflict`] and the elector treats the attempt as "not acquired".

use crate::errors::LockError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of the leader lock.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderElectionRecord {
    /// Identity of the current holder; empty when released
    #[serde(default)]
    pub holder_identity: String,
    /// How long the holder's claim is valid after each renewal
    #[serde(default)]
    pub lease_duration_seconds: i32,
    /// When the current holder took the lock
    #[serde(default, with = "micro_time")]
    pub acquire_time: Option<DateTime<Utc>>,
    /// When the current holder last renewed the lock
    #[serde(default, with = "micro_time")]
    pub renew_time: Option<DateTime<Utc>>,
    /// Number of times the lock changed hands
    #[serde(default)]
    pub lease_transitions: i32,
}

impl LeaderElectionRecord {
    /// True if `identity` is the recorded holder.
    #[must_use]
    pub fn is_held_by(&self, identity: &str) -> bool {
        !self.holder_identity.is_empty() && self.holder_identity == identity
    }
}

/// A record together with the store version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedRecord {
    pub record: LeaderElectionRecord,
    pub version: String,
}

/// Compare-and-swap storage for the leader lock.
#[async_trait]
pub trait ResourceLock: Send + Sync {
    /// Read the record, or `None` if it does not exist yet.
    async fn get(&self) -> Result<Option<VersionedRecord>, LockError>;

    /// Create the record. Fails with [`LockError::Conflict`] if it already exists.
    async fn create(&self, record: &LeaderElectionRecord) -> Result<VersionedRecord, LockError>;

    /// Overwrite the record if it is still at `version`.
    async fn update(
        &self,
        record: &LeaderElectionRecord,
        version: &str,
    ) -> Result<VersionedRecord, LockError>;

    /// Human readable `namespace/name` of the lock, for logs.
    fn describe(&self) -> String;
}

/// RFC3339 timestamps with microsecond precision, as stored on a `Lease`.
mod micro_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<DateTime<Utc>>::deserialize(deserializer)
    }
}

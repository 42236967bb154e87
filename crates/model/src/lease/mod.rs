use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

pub mod token;

pub use token::{ConcurrencyToken, ContinuationToken};

/// Persisted ownership record for one partition of the change stream.
///
/// The engine never creates or deletes leases; it only renews them, checkpoints
/// progress into them and releases them. Every write goes through the lease
/// store, which hands back the new version together with a fresh
/// [`ConcurrencyToken`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lease {
    pub partition_id: String,
    pub owner: Option<String>,
    pub continuation: Option<ContinuationToken>,
    pub concurrency_token: ConcurrencyToken,
    /// Last time ownership was confirmed (acquire, renew or checkpoint).
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Lease {
    /// Unowned lease as first written by whoever discovers the partition.
    pub fn unowned(partition_id: impl Into<String>, continuation: Option<ContinuationToken>) -> Self {
        Self {
            partition_id: partition_id.into(),
            owner: None,
            continuation,
            concurrency_token: ConcurrencyToken::generate(),
            timestamp: Utc::now(),
            properties: HashMap::new(),
        }
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner)
    }

    /// True once `expiration` has elapsed since the last confirmation.
    pub fn is_expired(&self, now: DateTime<Utc>, expiration: Duration) -> bool {
        // A deadline past the representable range never arrives.
        chrono::Duration::from_std(expiration)
            .ok()
            .and_then(|ttl| self.timestamp.checked_add_signed(ttl))
            .is_some_and(|deadline| deadline <= now)
    }

    /// Owned and still inside its TTL window.
    pub fn is_held(&self, now: DateTime<Utc>, expiration: Duration) -> bool {
        self.owner.is_some() && !self.is_expired(now, expiration)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

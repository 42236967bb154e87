use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{ContinuationToken, Lease};
use std::time::Duration;

pub mod memory;
pub mod sled_store;

/// Durable lease records with optimistic concurrency.
///
/// Every mutating call (except `acquire` and `create_if_absent`) presents the
/// lease as last read; the store rejects it with [`StoreError::Conflict`] when
/// the stored concurrency token or owner differs, and with
/// [`StoreError::NotFound`] when the record is gone. A successful write returns
/// the new version with a fresh token and `timestamp = now`.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Writes an unowned lease unless one exists. Returns whether it was created.
    async fn create_if_absent(
        &self,
        partition_id: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<bool, StoreError>;

    async fn get(&self, partition_id: &str) -> Result<Option<Lease>, StoreError>;

    /// All leases, ordered by partition id.
    async fn list(&self) -> Result<Vec<Lease>, StoreError>;

    /// Takes ownership if the lease is free, expired, or already ours.
    async fn acquire(&self, partition_id: &str, owner: &str) -> Result<Lease, StoreError>;

    /// Confirms ownership: refreshes timestamp and token.
    async fn renew(&self, lease: &Lease) -> Result<Lease, StoreError>;

    /// Checkpoints `continuation` into the lease.
    async fn replace(
        &self,
        lease: &Lease,
        continuation: ContinuationToken,
    ) -> Result<Lease, StoreError>;

    /// Clears the owner so another worker can acquire immediately.
    async fn release(&self, lease: &Lease) -> Result<(), StoreError>;

    /// Removes the record. Reserved for fleet management.
    async fn delete(&self, lease: &Lease) -> Result<(), StoreError>;
}

/// Acquisition rule shared by the store adapters.
pub fn is_acquirable(lease: &Lease, owner: &str, now: DateTime<Utc>, expiration: Duration) -> bool {
    lease.owner.is_none() || lease.is_owned_by(owner) || lease.is_expired(now, expiration)
}

/// Precondition for renew/replace/release/delete.
pub(crate) fn check_writable(stored: &Lease, presented: &Lease) -> Result<(), StoreError> {
    if stored.concurrency_token != presented.concurrency_token || stored.owner != presented.owner {
        return Err(StoreError::conflict(&presented.partition_id));
    }
    Ok(())
}

/// Next version of `lease` after a successful write.
pub(crate) fn next_version(lease: &Lease) -> Lease {
    let mut next = lease.clone();
    next.concurrency_token = model::ConcurrencyToken::generate();
    next.timestamp = Utc::now();
    next
}

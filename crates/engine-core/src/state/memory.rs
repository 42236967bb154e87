use crate::{
    error::StoreError,
    state::{LeaseStore, check_writable, is_acquirable, next_version},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{ContinuationToken, Lease};
use std::{collections::BTreeMap, time::Duration};
use tokio::sync::Mutex;
use tracing::debug;

/// Process-local lease store. Suitable for single-host deployments and tests.
pub struct InMemoryLeaseStore {
    leases: Mutex<BTreeMap<String, Lease>>,
    expiration: Duration,
}

impl InMemoryLeaseStore {
    pub fn new(expiration: Duration) -> Self {
        Self {
            leases: Mutex::new(BTreeMap::new()),
            expiration,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Applies `mutate` to the stored lease after checking the write precondition.
    async fn write<F>(&self, presented: &Lease, mutate: F) -> Result<Lease, StoreError>
    where
        F: FnOnce(&mut Lease),
    {
        let mut leases = self.leases.lock().await;
        let stored = leases
            .get_mut(&presented.partition_id)
            .ok_or_else(|| StoreError::not_found(&presented.partition_id))?;
        check_writable(stored, presented)?;

        let mut next = next_version(stored);
        mutate(&mut next);
        *stored = next.clone();
        Ok(next)
    }
}

impl Default for InMemoryLeaseStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn create_if_absent(
        &self,
        partition_id: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().await;
        if leases.contains_key(partition_id) {
            return Ok(false);
        }
        leases.insert(
            partition_id.to_string(),
            Lease::unowned(partition_id, continuation),
        );
        debug!(partition = %partition_id, "Lease created");
        Ok(true)
    }

    async fn get(&self, partition_id: &str) -> Result<Option<Lease>, StoreError> {
        Ok(self.leases.lock().await.get(partition_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Lease>, StoreError> {
        Ok(self.leases.lock().await.values().cloned().collect())
    }

    async fn acquire(&self, partition_id: &str, owner: &str) -> Result<Lease, StoreError> {
        let mut leases = self.leases.lock().await;
        let stored = leases
            .get_mut(partition_id)
            .ok_or_else(|| StoreError::not_found(partition_id))?;

        if !is_acquirable(stored, owner, Utc::now(), self.expiration) {
            return Err(StoreError::conflict(partition_id));
        }

        let mut next = next_version(stored);
        next.owner = Some(owner.to_string());
        *stored = next.clone();
        Ok(next)
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease, StoreError> {
        self.write(lease, |_| {}).await
    }

    async fn replace(
        &self,
        lease: &Lease,
        continuation: ContinuationToken,
    ) -> Result<Lease, StoreError> {
        self.write(lease, |next| next.continuation = Some(continuation))
            .await
    }

    async fn release(&self, lease: &Lease) -> Result<(), StoreError> {
        self.write(lease, |next| next.owner = None).await.map(|_| ())
    }

    async fn delete(&self, lease: &Lease) -> Result<(), StoreError> {
        let mut leases = self.leases.lock().await;
        let stored = leases
            .get(&lease.partition_id)
            .ok_or_else(|| StoreError::not_found(&lease.partition_id))?;
        check_writable(stored, lease)?;
        leases.remove(&lease.partition_id);
        Ok(())
    }
}

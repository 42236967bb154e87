use crate::{
    error::StoreError,
    state::{LeaseStore, check_writable, is_acquirable, next_version},
};
use async_trait::async_trait;
use chrono::Utc;
use model::{ContinuationToken, Lease};
use sled::IVec;
use std::{path::Path, time::Duration};
use tracing::debug;

const LEASE_PREFIX: &str = "lease:";

/// Lease store on an embedded sled database.
///
/// Optimistic concurrency maps onto sled's `compare_and_swap`: a write only
/// lands if the stored bytes are still the ones the precondition was checked
/// against, so two processes sharing the database can never both win.
pub struct SledLeaseStore {
    db: sled::Db,
    expiration: Duration,
}

impl SledLeaseStore {
    pub fn open(path: impl AsRef<Path>, expiration: Duration) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db, expiration })
    }

    /// Helper to generate consistent keys for leases
    #[inline]
    fn lease_key(partition_id: &str) -> String {
        format!("{LEASE_PREFIX}{partition_id}")
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Reads the record, lets `mutate` derive the next version, then swaps it in
    /// only if nobody changed the record in between.
    fn update<F>(&self, partition_id: &str, mutate: F) -> Result<Option<Lease>, StoreError>
    where
        F: FnOnce(&Lease) -> Result<Option<Lease>, StoreError>,
    {
        let key = Self::lease_key(partition_id);
        let current_bytes = self
            .db
            .get(&key)?
            .ok_or_else(|| StoreError::not_found(partition_id))?;
        let current: Lease = bincode::deserialize(&current_bytes)?;

        let next = mutate(&current)?;
        let next_bytes = match &next {
            Some(lease) => Some(IVec::from(bincode::serialize(lease)?)),
            None => None,
        };

        match self
            .db
            .compare_and_swap(&key, Some(current_bytes), next_bytes)?
        {
            Ok(()) => Ok(next),
            Err(_) => Err(StoreError::conflict(partition_id)),
        }
    }

    fn write<F>(&self, presented: &Lease, mutate: F) -> Result<Lease, StoreError>
    where
        F: FnOnce(&mut Lease),
    {
        let next = self.update(&presented.partition_id, |stored| {
            check_writable(stored, presented)?;
            let mut next = next_version(stored);
            mutate(&mut next);
            Ok(Some(next))
        })?;
        next.ok_or_else(|| StoreError::not_found(&presented.partition_id))
    }
}

#[async_trait]
impl LeaseStore for SledLeaseStore {
    async fn create_if_absent(
        &self,
        partition_id: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<bool, StoreError> {
        let key = Self::lease_key(partition_id);
        let bytes = bincode::serialize(&Lease::unowned(partition_id, continuation))?;
        let created = self
            .db
            .compare_and_swap(&key, None::<IVec>, Some(bytes))?
            .is_ok();
        if created {
            debug!(partition = %partition_id, "Lease created");
        }
        Ok(created)
    }

    async fn get(&self, partition_id: &str) -> Result<Option<Lease>, StoreError> {
        match self.db.get(Self::lease_key(partition_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Lease>, StoreError> {
        let mut leases = Vec::new();
        for item in self.db.scan_prefix(LEASE_PREFIX) {
            let (_key, value) = item?;
            leases.push(bincode::deserialize::<Lease>(&value)?);
        }
        Ok(leases)
    }

    async fn acquire(&self, partition_id: &str, owner: &str) -> Result<Lease, StoreError> {
        let expiration = self.expiration;
        let next = self.update(partition_id, |stored| {
            if !is_acquirable(stored, owner, Utc::now(), expiration) {
                return Err(StoreError::conflict(partition_id));
            }
            let mut next = next_version(stored);
            next.owner = Some(owner.to_string());
            Ok(Some(next))
        })?;
        next.ok_or_else(|| StoreError::not_found(partition_id))
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease, StoreError> {
        self.write(lease, |_| {})
    }

    async fn replace(
        &self,
        lease: &Lease,
        continuation: ContinuationToken,
    ) -> Result<Lease, StoreError> {
        self.write(lease, |next| next.continuation = Some(continuation))
    }

    async fn release(&self, lease: &Lease) -> Result<(), StoreError> {
        self.write(lease, |next| next.owner = None).map(|_| ())
    }

    async fn delete(&self, lease: &Lease) -> Result<(), StoreError> {
        self.update(&lease.partition_id, |stored| {
            check_writable(stored, lease)?;
            Ok(None)
        })
        .map(|_| ())
    }
}

//! Fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use engine_core::{
    connectors::{
        feed::{FeedPage, FeedReader, ReadRequest},
        observer::{Observer, ObserverContext},
    },
    error::{ObserverError, ReadError, StoreError},
    state::{LeaseStore, memory::InMemoryLeaseStore},
};
use model::{ChangeBatch, ChangeRecord, ContinuationToken, Lease};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;

pub(crate) fn changes(count: u64, first_sequence: u64, continuation: &str) -> FeedPage {
    let records = (0..count)
        .map(|i| {
            let seq = first_sequence + i;
            ChangeRecord::new(format!("key-{seq}"), seq, serde_json::json!({ "seq": seq }))
        })
        .collect();
    FeedPage::Changes {
        records,
        continuation: continuation.into(),
    }
}

/// Replays a fixed list of pages, then reports "not modified" forever.
pub(crate) struct ScriptedReader {
    pages: Mutex<VecDeque<Result<FeedPage, ReadError>>>,
    calls: Mutex<Vec<(ReadRequest, Instant)>>,
}

impl ScriptedReader {
    pub(crate) fn new(pages: Vec<Result<FeedPage, ReadError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ReadRequest> {
        self.calls.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl FeedReader for ScriptedReader {
    async fn read_next(&self, request: ReadRequest) -> Result<FeedPage, ReadError> {
        let continuation = request
            .continuation
            .clone()
            .unwrap_or_else(|| ContinuationToken::new("lsn:0"));
        self.calls.lock().unwrap().push((request, Instant::now()));
        match self.pages.lock().unwrap().pop_front() {
            Some(page) => page,
            None => Ok(FeedPage::NotModified { continuation }),
        }
    }
}

/// Records delivered batches; optionally fails on the n-th delivery.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    batches: Mutex<Vec<ChangeBatch>>,
    fail_on: Option<usize>,
}

impl RecordingObserver {
    pub(crate) fn failing_on(index: usize) -> Self {
        Self {
            fail_on: Some(index),
            ..Self::default()
        }
    }

    pub(crate) fn batches(&self) -> Vec<ChangeBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    async fn process_changes(
        &self,
        _ctx: &ObserverContext,
        batch: &ChangeBatch,
    ) -> Result<(), ObserverError> {
        let mut batches = self.batches.lock().unwrap();
        let index = batches.len();
        batches.push(batch.clone());
        if self.fail_on == Some(index) {
            return Err(ObserverError::new("poison record"));
        }
        Ok(())
    }
}

/// In-memory store with injectable renew/replace failures.
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryLeaseStore,
    renew_failures: Mutex<VecDeque<StoreError>>,
    replace_failures: Mutex<VecDeque<StoreError>>,
    renew_calls: AtomicUsize,
    replace_calls: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryLeaseStore::new(Duration::from_secs(60)),
            renew_failures: Mutex::new(VecDeque::new()),
            replace_failures: Mutex::new(VecDeque::new()),
            renew_calls: AtomicUsize::new(0),
            replace_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) async fn acquired(partition_id: &str) -> (Self, Lease) {
        let store = Self::new();
        store.inner.create_if_absent(partition_id, None).await.unwrap();
        let lease = store.inner.acquire(partition_id, "worker-a").await.unwrap();
        (store, lease)
    }

    pub(crate) fn fail_renew(&self, errors: Vec<StoreError>) {
        self.renew_failures.lock().unwrap().extend(errors);
    }

    pub(crate) fn fail_replace(&self, errors: Vec<StoreError>) {
        self.replace_failures.lock().unwrap().extend(errors);
    }

    pub(crate) fn renew_calls(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn replace_calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaseStore for FlakyStore {
    async fn create_if_absent(
        &self,
        partition_id: &str,
        continuation: Option<ContinuationToken>,
    ) -> Result<bool, StoreError> {
        self.inner.create_if_absent(partition_id, continuation).await
    }

    async fn get(&self, partition_id: &str) -> Result<Option<Lease>, StoreError> {
        self.inner.get(partition_id).await
    }

    async fn list(&self) -> Result<Vec<Lease>, StoreError> {
        self.inner.list().await
    }

    async fn acquire(&self, partition_id: &str, owner: &str) -> Result<Lease, StoreError> {
        self.inner.acquire(partition_id, owner).await
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease, StoreError> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self.renew_failures.lock().unwrap().pop_front();
        match injected {
            Some(err) => Err(err),
            None => self.inner.renew(lease).await,
        }
    }

    async fn replace(
        &self,
        lease: &Lease,
        continuation: ContinuationToken,
    ) -> Result<Lease, StoreError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self.replace_failures.lock().unwrap().pop_front();
        match injected {
            Some(err) => Err(err),
            None => self.inner.replace(lease, continuation).await,
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), StoreError> {
        self.inner.release(lease).await
    }

    async fn delete(&self, lease: &Lease) -> Result<(), StoreError> {
        self.inner.delete(lease).await
    }
}

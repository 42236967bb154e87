use async_trait::async_trait;
use engine_core::{
    connectors::{
        estimate::LagEstimator,
        feed::{FeedPage, FeedReader, ReadRequest},
        observer::{CloseReason, Observer, ObserverContext},
    },
    error::{ObserverError, ReadError, StoreError},
    state::{LeaseStore, memory::InMemoryLeaseStore},
};
use model::{ChangeBatch, ChangeRecord, ContinuationToken, Lease};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub fn changes(count: u64, first_sequence: u64, continuation: &str) -> FeedPage {
    FeedPage::Changes {
        records: (0..count)
            .map(|i| ChangeRecord::new(format!("k{}", first_sequence + i), first_sequence + i, serde_json::Value::Null))
            .collect(),
        continuation: continuation.into(),
    }
}

// Mock reader: scripted pages, then idle forever
pub struct MockReader {
    pages: Mutex<VecDeque<Result<FeedPage, ReadError>>>,
    reads: AtomicUsize,
}

impl MockReader {
    pub fn new(pages: Vec<Result<FeedPage, ReadError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedReader for MockReader {
    async fn read_next(&self, request: ReadRequest) -> Result<FeedPage, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(FeedPage::NotModified {
                continuation: request
                    .continuation
                    .unwrap_or_else(|| ContinuationToken::new("lsn:0")),
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Process(String),
    Close(CloseReason),
}

// Mock observer recording its lifecycle
#[derive(Default)]
pub struct MockObserver {
    pub(crate) events: Mutex<Vec<Event>>,
    pub fail_open: bool,
    pub fail_close: bool,
    pub fail_process: bool,
    pub panic_in_process: bool,
}

impl MockObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Observer for MockObserver {
    async fn open(&self, _partition_id: &str) -> Result<(), ObserverError> {
        self.push(Event::Open);
        if self.fail_open {
            return Err(ObserverError::new("cannot open"));
        }
        Ok(())
    }

    async fn process_changes(
        &self,
        ctx: &ObserverContext,
        _batch: &ChangeBatch,
    ) -> Result<(), ObserverError> {
        self.push(Event::Process(ctx.continuation.to_string()));
        if self.panic_in_process {
            panic!("observer bug");
        }
        if self.fail_process {
            return Err(ObserverError::new("cannot process"));
        }
        Ok(())
    }

    async fn close(&self, _partition_id: &str, reason: CloseReason) -> Result<(), ObserverError> {
        self.push(Event::Close(reason));
        if self.fail_close {
            return Err(ObserverError::new("cannot close"));
        }
        Ok(())
    }
}

// Mock store: in-memory with injectable renewal and release failures
pub struct MockStore {
    pub inner: InMemoryLeaseStore,
    renew_failures: Mutex<VecDeque<StoreError>>,
    release_failures: Mutex<VecDeque<StoreError>>,
    release_calls: AtomicUsize,
}

impl MockStore {
    pub async fn with_lease(partition_id: &str) -> (Self, Lease) {
        let inner = InMemoryLeaseStore::new(Duration::from_secs(60));
        inner.create_if_absent(partition_id, None).await.unwrap();
        let lease = inner.acquire(partition_id, "worker-a").await.unwrap();
        let store = Self {
            inner,
            renew_failures: Mutex::new(VecDeque::new()),
            release_failures: Mutex::new(VecDeque::new()),
            release_calls: AtomicUsize::new(0),
        };
        (store, lease)
    }

    pub fn fail_renew(&self, errors: Vec<StoreError>) {
        self.renew_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_release(&self, errors: Vec<StoreError>) {
        self.release_failures.lock().unwrap().extend(errors);
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaseStore for MockStore {
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
        self.inner.replace(lease, continuation).await
    }

    async fn release(&self, lease: &Lease) -> Result<(), StoreError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self.release_failures.lock().unwrap().pop_front();
        match injected {
            Some(err) => Err(err),
            None => self.inner.release(lease).await,
        }
    }

    async fn delete(&self, lease: &Lease) -> Result<(), StoreError> {
        self.inner.delete(lease).await
    }
}

// Mock estimator: every partition ends at `head`, continuations are lsn:<n>
pub struct MockEstimator {
    head: u64,
    failures: Mutex<HashMap<String, ReadError>>,
    calls: AtomicUsize,
}

impl MockEstimator {
    pub fn new(head: u64) -> Self {
        Self {
            head,
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail(&self, partition_id: &str, err: ReadError) {
        self.failures.lock().unwrap().insert(partition_id.to_string(), err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LagEstimator for MockEstimator {
    async fn estimate_lag(
        &self,
        partition_id: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<u64, ReadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().get(partition_id) {
            return Err(err.clone());
        }
        let read = continuation
            .and_then(|c| c.as_str().strip_prefix("lsn:"))
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(self.head.saturating_sub(read))
    }
}

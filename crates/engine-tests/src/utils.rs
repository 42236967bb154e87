#![allow(dead_code)]

use async_trait::async_trait;
use engine_core::{
    connectors::{
        feed::{FeedPage, FeedReader, ReadRequest},
        observer::{CloseReason, Observer, ObserverContext},
    },
    error::{ObserverError, ReadError, StoreError},
    state::LeaseStore,
};
use model::{ChangeBatch, ChangeRecord, ContinuationToken, Lease};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::time::{Instant, sleep};

/// Parses the numeric part of an `lsn:<n>` continuation.
pub fn lsn(continuation: Option<&ContinuationToken>) -> u64 {
    continuation
        .and_then(|c| c.as_str().strip_prefix("lsn:"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub fn page(count: u64, after: u64) -> FeedPage {
    let records = (1..=count)
        .map(|i| {
            let seq = after + i;
            ChangeRecord::new(format!("key-{seq}"), seq, serde_json::json!({ "seq": seq }))
        })
        .collect();
    FeedPage::Changes {
        records,
        continuation: format!("lsn:{}", after + count).into(),
    }
}

/// How a [`TestFeed`] answers once its script is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    /// `NotModified` at the current position.
    Idle,
    /// A fresh page of `n` records after the current position.
    Endless(u64),
}

/// Feed reader that replays scripted answers and logs every request.
pub struct TestFeed {
    script: Mutex<VecDeque<Result<FeedPage, ReadError>>>,
    after: AfterScript,
    calls: Mutex<Vec<(ReadRequest, Instant)>>,
}

impl TestFeed {
    pub fn new(script: Vec<Result<FeedPage, ReadError>>, after: AfterScript) -> Self {
        Self {
            script: Mutex::new(script.into()),
            after,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn idle() -> Self {
        Self::new(vec![], AfterScript::Idle)
    }

    pub fn endless(page_size: u64) -> Self {
        Self::new(vec![], AfterScript::Endless(page_size))
    }

    pub fn requests(&self) -> Vec<ReadRequest> {
        self.calls.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl FeedReader for TestFeed {
    async fn read_next(&self, request: ReadRequest) -> Result<FeedPage, ReadError> {
        let position = lsn(request.continuation.as_ref());
        self.calls.lock().unwrap().push((request, Instant::now()));

        if let Some(answer) = self.script.lock().unwrap().pop_front() {
            return answer;
        }
        match self.after {
            AfterScript::Idle => Ok(FeedPage::NotModified {
                continuation: format!("lsn:{position}").into(),
            }),
            AfterScript::Endless(n) => Ok(page(n, position)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Process {
        batch_id: String,
        start: Option<ContinuationToken>,
        continuation: ContinuationToken,
    },
    Close(CloseReason),
}

/// Observer that journals every call and flags overlapping deliveries.
#[derive(Default)]
pub struct JournalObserver {
    pub(crate) calls: Mutex<Vec<(Call, Instant)>>,
    pub(crate) in_flight: AtomicBool,
    pub(crate) overlaps: AtomicUsize,
    pub processing_time: Duration,
    pub fail_process_on: Option<usize>,
    pub fail_open: bool,
}

impl JournalObserver {
    pub fn slow(processing_time: Duration) -> Self {
        Self {
            processing_time,
            ..Self::default()
        }
    }

    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_process_on: Some(index),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Start instants of every `process_changes` call.
    pub fn process_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| matches!(c, Call::Process { .. }))
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn batches(&self) -> Vec<(String, Option<ContinuationToken>, ContinuationToken)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Process {
                    batch_id,
                    start,
                    continuation,
                } => Some((batch_id, start, continuation)),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<CloseReason> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Close(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push((call, Instant::now()));
        calls
            .iter()
            .filter(|(c, _)| matches!(c, Call::Process { .. }))
            .count()
    }
}

#[async_trait]
impl Observer for JournalObserver {
    async fn open(&self, _partition_id: &str) -> Result<(), ObserverError> {
        self.record(Call::Open);
        if self.fail_open {
            return Err(ObserverError::new("open refused"));
        }
        Ok(())
    }

    async fn process_changes(
        &self,
        ctx: &ObserverContext,
        batch: &ChangeBatch,
    ) -> Result<(), ObserverError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let delivered = self.record(Call::Process {
            batch_id: ctx.batch_id.clone(),
            start: batch.start.clone(),
            continuation: batch.continuation.clone(),
        });
        if !self.processing_time.is_zero() {
            sleep(self.processing_time).await;
        }
        self.in_flight.store(false, Ordering::SeqCst);

        if self.fail_process_on == Some(delivered - 1) {
            return Err(ObserverError::new("poison record"));
        }
        Ok(())
    }

    async fn close(&self, _partition_id: &str, reason: CloseReason) -> Result<(), ObserverError> {
        self.record(Call::Close(reason));
        Ok(())
    }
}

/// Wraps a real store, injecting failures and counting writes that landed.
pub struct FaultyStore {
    inner: Arc<dyn LeaseStore>,
    renew_failures: Mutex<VecDeque<StoreError>>,
    replace_failures: Mutex<VecDeque<StoreError>>,
    renewed: Mutex<Vec<Instant>>,
    replaced: Mutex<Vec<(ContinuationToken, Instant)>>,
    rejected_renewals: Mutex<Vec<Instant>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn LeaseStore>) -> Self {
        Self {
            inner,
            renew_failures: Mutex::new(VecDeque::new()),
            replace_failures: Mutex::new(VecDeque::new()),
            renewed: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            rejected_renewals: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_renew(&self, errors: Vec<StoreError>) {
        self.renew_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_replace(&self, errors: Vec<StoreError>) {
        self.replace_failures.lock().unwrap().extend(errors);
    }

    pub fn renewals(&self) -> Vec<Instant> {
        self.renewed.lock().unwrap().clone()
    }

    pub fn rejected_renewals(&self) -> Vec<Instant> {
        self.rejected_renewals.lock().unwrap().clone()
    }

    /// Continuations of successful `replace` calls, in order.
    pub fn checkpoints(&self) -> Vec<ContinuationToken> {
        self.replaced.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn checkpoint_times(&self) -> Vec<Instant> {
        self.replaced.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl LeaseStore for FaultyStore {
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
        let result = match injected {
            Some(err) => Err(err),
            None => self.inner.renew(lease).await,
        };
        match &result {
            Ok(_) => self.renewed.lock().unwrap().push(Instant::now()),
            Err(_) => self.rejected_renewals.lock().unwrap().push(Instant::now()),
        }
        result
    }

    async fn replace(
        &self,
        lease: &Lease,
        continuation: ContinuationToken,
    ) -> Result<Lease, StoreError> {
        let injected = self.replace_failures.lock().unwrap().pop_front();
        if let Some(err) = injected {
            return Err(err);
        }
        let updated = self.inner.replace(lease, continuation.clone()).await?;
        self.replaced
            .lock()
            .unwrap()
            .push((continuation, Instant::now()));
        Ok(updated)
    }

    async fn release(&self, lease: &Lease) -> Result<(), StoreError> {
        self.inner.release(lease).await
    }

    async fn delete(&self, lease: &Lease) -> Result<(), StoreError> {
        self.inner.delete(lease).await
    }
}

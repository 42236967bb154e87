use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    batches_delivered: AtomicU64,
    records_delivered: AtomicU64,
    checkpoints: AtomicU64,
    renewals: AtomicU64,
    empty_reads: AtomicU64,
    retry_count: AtomicU64,
    failure_count: AtomicU64,
}

/// Counters for one partition. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub checkpoints: u64,
    pub renewals: u64,
    pub empty_reads: u64,
    pub retry_count: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn record_delivery(&self, records: u64) {
        self.inner.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.inner
            .records_delivered
            .fetch_add(records, Ordering::Relaxed);
    }

    pub fn increment_checkpoints(&self) {
        self.inner.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_renewals(&self) {
        self.inner.renewals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_empty_reads(&self) {
        self.inner.empty_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_delivered: self.inner.batches_delivered.load(Ordering::Relaxed),
            records_delivered: self.inner.records_delivered.load(Ordering::Relaxed),
            checkpoints: self.inner.checkpoints.load(Ordering::Relaxed),
            renewals: self.inner.renewals.load(Ordering::Relaxed),
            empty_reads: self.inner.empty_reads.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

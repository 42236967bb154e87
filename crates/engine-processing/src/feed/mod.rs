use crate::{
    checkpoint::PartitionCheckpointer, error::CheckpointError, keeper::KeeperHandle,
    retry::classify_read_error,
};
use config::FeedProcessorConfig;
use engine_core::{
    backoff::IdleBackoff,
    connectors::{
        feed::{FeedPage, FeedReader, ReadRequest},
        observer::{Observer, ObserverContext},
    },
    error::{ObserverError, ReadError},
    metrics::Metrics,
    monitor::{HealthMonitor, HealthRecord, MonitoredOperation},
    retry::{RetryDisposition, RetryError},
};
use model::{ChangeBatch, ContinuationToken};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod config;

/// How a feed loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    Cancelled,
    LeaseLost { reason: String },
    ObserverFailed(ObserverError),
    PartitionGone,
    ReaderFailed(String),
}

/// Drives read → deliver → checkpoint for one partition.
///
/// Delivery is strictly sequential: the next page is only requested after the
/// observer returned for the previous one and its checkpoint landed.
pub struct FeedProcessor {
    partition_id: String,
    keeper: KeeperHandle,
    reader: Arc<dyn FeedReader>,
    observer: Arc<dyn Observer>,
    checkpointer: PartitionCheckpointer,
    config: FeedProcessorConfig,
    metrics: Metrics,
    monitor: Arc<dyn HealthMonitor>,
}

impl FeedProcessor {
    pub fn new(
        keeper: KeeperHandle,
        reader: Arc<dyn FeedReader>,
        observer: Arc<dyn Observer>,
        config: FeedProcessorConfig,
        metrics: Metrics,
        monitor: Arc<dyn HealthMonitor>,
    ) -> Self {
        let checkpointer = PartitionCheckpointer::new(
            keeper.clone(),
            config.checkpoint_retry.clone(),
            metrics.clone(),
        );
        Self {
            partition_id: keeper.current().partition_id,
            keeper,
            reader,
            observer,
            checkpointer,
            config,
            metrics,
            monitor,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> FeedOutcome {
        // `position` follows every page; `confirmed` only moves on checkpoints
        // and anchors batch ids, so a redelivered batch keeps its id.
        let mut position = self.keeper.current().continuation;
        let mut confirmed = position.clone();
        let mut backoff = IdleBackoff::new(self.config.backoff.clone());
        info!(
            partition = %self.partition_id,
            continuation = ?position.as_ref().map(|c| c.as_str()),
            "Feed processor started"
        );

        loop {
            if cancel.is_cancelled() {
                return FeedOutcome::Cancelled;
            }

            let page = match self.read_page(position.clone(), &cancel).await {
                Ok(page) => page,
                Err(outcome) => return outcome,
            };

            if cancel.is_cancelled() {
                return FeedOutcome::Cancelled;
            }

            if page.is_empty() {
                position = Some(page.continuation().clone());
                self.metrics.increment_empty_reads();

                let delay = backoff.next_delay();
                debug!(
                    partition = %self.partition_id,
                    delay_ms = delay.as_millis() as u64,
                    "No new changes"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return FeedOutcome::Cancelled,
                    _ = sleep(delay) => {}
                }
                continue;
            }

            backoff.reset();
            let FeedPage::Changes {
                records,
                continuation,
            } = page
            else {
                continue;
            };

            let batch = ChangeBatch::new(&self.partition_id, confirmed.clone(), continuation, records);
            if let Some(outcome) = self.deliver(&batch).await {
                return outcome;
            }

            // The observer call is never interrupted, but a stop requested while
            // it ran must not be followed by a checkpoint.
            if cancel.is_cancelled() {
                info!(
                    partition = %self.partition_id,
                    batch_id = %batch.id,
                    "Stop requested during processing, batch left unconfirmed"
                );
                return FeedOutcome::Cancelled;
            }

            match self
                .checkpointer
                .checkpoint(batch.continuation.clone(), &cancel)
                .await
            {
                Ok(_) => {
                    position = Some(batch.continuation.clone());
                    confirmed = position.clone();
                }
                Err(CheckpointError::Cancelled) => return FeedOutcome::Cancelled,
                Err(CheckpointError::LeaseLost { reason, .. }) => {
                    warn!(
                        partition = %self.partition_id,
                        batch_id = %batch.id,
                        error = %reason,
                        "Checkpoint rejected, lease lost"
                    );
                    self.monitor.inspect(HealthRecord::warning(
                        &self.partition_id,
                        MonitoredOperation::Checkpoint,
                        format!("lease lost: {reason}"),
                    ));
                    return FeedOutcome::LeaseLost { reason };
                }
            }
        }
    }

    async fn read_page(
        &self,
        continuation: Option<ContinuationToken>,
        cancel: &CancellationToken,
    ) -> Result<FeedPage, FeedOutcome> {
        let request = ReadRequest {
            partition_id: self.partition_id.clone(),
            continuation,
            max_item_count: self.config.max_item_count,
            start_from: self.config.start_from.clone(),
        };
        let metrics = self.metrics.clone();
        let partition_id = &self.partition_id;

        // Reads have no side effects, so an in-flight read may be abandoned.
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RetryError::Cancelled),
            result = self.config.read_retry.run(
                || self.reader.read_next(request.clone()),
                |err| {
                    let disposition = classify_read_error(err);
                    if disposition == RetryDisposition::Retry {
                        metrics.increment_retries(1);
                        warn!(partition = %partition_id, error = %err, "Read failed, retrying");
                    }
                    disposition
                },
                cancel,
            ) => result,
        };

        result.map_err(|err| match err {
            RetryError::Cancelled => FeedOutcome::Cancelled,
            RetryError::Fatal(ReadError::PartitionGone { .. }) => {
                info!(partition = %self.partition_id, "Partition gone, stopping");
                FeedOutcome::PartitionGone
            }
            RetryError::Fatal(err) | RetryError::AttemptsExceeded(err) => {
                error!(partition = %self.partition_id, error = %err, "Reading changes failed");
                self.metrics.increment_failures(1);
                self.monitor.inspect(HealthRecord::error(
                    &self.partition_id,
                    MonitoredOperation::ReadChanges,
                    err.to_string(),
                ));
                FeedOutcome::ReaderFailed(err.to_string())
            }
        })
    }

    /// Hands the batch to the observer. Returns an outcome only on failure.
    async fn deliver(&self, batch: &ChangeBatch) -> Option<FeedOutcome> {
        let ctx = ObserverContext {
            partition_id: self.partition_id.clone(),
            owner: self.keeper.current().owner,
            batch_id: batch.id.clone(),
            continuation: batch.continuation.clone(),
        };

        debug!(
            partition = %self.partition_id,
            batch_id = %batch.id,
            records = batch.len(),
            "Delivering batch"
        );

        match self.observer.process_changes(&ctx, batch).await {
            Ok(()) => {
                self.metrics.record_delivery(batch.len() as u64);
                None
            }
            Err(err) => {
                error!(
                    partition = %self.partition_id,
                    batch_id = %batch.id,
                    error = %err,
                    "Observer failed to process batch"
                );
                self.metrics.increment_failures(1);
                self.monitor.inspect(HealthRecord::error(
                    &self.partition_id,
                    MonitoredOperation::ProcessChanges,
                    err.to_string(),
                ));
                Some(FeedOutcome::ObserverFailed(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        keeper::spawn_keeper,
        test_support::{FlakyStore, RecordingObserver, ScriptedReader, changes},
    };
    use async_trait::async_trait;
    use engine_core::{
        backoff::BackoffPolicy, error::StoreError, monitor::TracingHealthMonitor,
        retry::RetryPolicy, state::LeaseStore,
    };
    use std::time::Duration;

    fn config() -> FeedProcessorConfig {
        FeedProcessorConfig::default()
            .with_backoff(BackoffPolicy::new(
                Duration::from_millis(100),
                Duration::from_millis(400),
                2.0,
            ))
            .with_read_retry(RetryPolicy::new(
                3,
                Duration::from_millis(10),
                Duration::from_millis(50),
            ))
            .with_max_item_count(10)
    }

    struct Harness {
        store: Arc<FlakyStore>,
        reader: Arc<ScriptedReader>,
        processor: FeedProcessor,
        metrics: Metrics,
    }

    async fn harness(
        pages: Vec<Result<FeedPage, ReadError>>,
        observer: Arc<dyn Observer>,
    ) -> Harness {
        let (store, lease) = FlakyStore::acquired("p-0").await;
        let store = Arc::new(store);
        let reader = Arc::new(ScriptedReader::new(pages));
        let (keeper, _task) = spawn_keeper(store.clone(), lease);
        let metrics = Metrics::new();
        let processor = FeedProcessor::new(
            keeper,
            reader.clone(),
            observer,
            config(),
            metrics.clone(),
            Arc::new(TracingHealthMonitor),
        );
        Harness {
            store,
            reader,
            processor,
            metrics,
        }
    }

    async fn run_for(processor: FeedProcessor, duration: Duration) -> FeedOutcome {
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { processor.run(cancel).await }
        });
        sleep(duration).await;
        cancel.cancel();
        task.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_order_and_checkpoints_each_batch() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(
            vec![Ok(changes(2, 1, "lsn:2")), Ok(changes(1, 3, "lsn:3"))],
            observer.clone(),
        )
        .await;

        let outcome = run_for(h.processor, Duration::from_secs(1)).await;
        assert_eq!(outcome, FeedOutcome::Cancelled);

        let batches = observer.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].start, None);
        assert_eq!(batches[1].start, Some("lsn:2".into()));
        assert_eq!(batches[1].records[0].sequence, 3);

        let requests = h.reader.requests();
        assert_eq!(requests[0].continuation, None);
        assert_eq!(requests[0].max_item_count, 10);
        assert_eq!(requests[1].continuation, Some("lsn:2".into()));
        assert_eq!(requests[2].continuation, Some("lsn:3".into()));

        let stored = h.store.get("p-0").await.unwrap().unwrap();
        assert_eq!(stored.continuation, Some("lsn:3".into()));
        assert_eq!(h.store.replace_calls(), 2);
        let snap = h.metrics.snapshot();
        assert_eq!(snap.records_delivered, 3);
        assert_eq!(snap.checkpoints, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_failure_leaves_batch_unconfirmed() {
        let observer = Arc::new(RecordingObserver::failing_on(0));
        let h = harness(vec![Ok(changes(3, 1, "lsn:3"))], observer.clone()).await;

        let outcome = h.processor.run(CancellationToken::new()).await;
        assert_eq!(
            outcome,
            FeedOutcome::ObserverFailed(ObserverError::new("poison record"))
        );
        assert_eq!(h.store.replace_calls(), 0);
        assert!(h.store.get("p-0").await.unwrap().unwrap().continuation.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn partition_gone_stops_without_checkpoint() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(
            vec![Err(ReadError::PartitionGone {
                partition_id: "p-0".into(),
            })],
            observer.clone(),
        )
        .await;

        assert_eq!(
            h.processor.run(CancellationToken::new()).await,
            FeedOutcome::PartitionGone
        );
        assert!(observer.batches().is_empty());
        assert_eq!(h.store.replace_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_read_errors_are_retried() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(
            vec![
                Err(ReadError::Transient("503".into())),
                Err(ReadError::Transient("503".into())),
                Ok(changes(1, 1, "lsn:1")),
            ],
            observer.clone(),
        )
        .await;

        run_for(h.processor, Duration::from_millis(500)).await;
        assert_eq!(observer.batches().len(), 1);
        assert_eq!(h.metrics.snapshot().retry_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_read_retries_fail_the_reader() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(
            vec![Err(ReadError::Transient("503".into())); 3],
            observer,
        )
        .await;

        assert_eq!(
            h.processor.run(CancellationToken::new()).await,
            FeedOutcome::ReaderFailed("Transient read failure: 503".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoint_conflict_is_lease_lost() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(vec![Ok(changes(2, 1, "lsn:2"))], observer.clone()).await;
        h.store.fail_replace(vec![StoreError::conflict("p-0")]);

        let outcome = h.processor.run(CancellationToken::new()).await;
        assert!(matches!(outcome, FeedOutcome::LeaseLost { .. }));
        assert_eq!(observer.batches().len(), 1);
        assert_eq!(h.reader.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_partition_backs_off_within_bounds() {
        let observer = Arc::new(RecordingObserver::default());
        let h = harness(vec![], observer).await;

        run_for(h.processor, Duration::from_secs(3)).await;

        let times = h.reader.call_times();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.len() >= 5);
        assert_eq!(gaps[0], Duration::from_millis(100));
        assert_eq!(gaps[1], Duration::from_millis(200));
        assert!(gaps.iter().all(|g| *g >= Duration::from_millis(100)));
        assert!(gaps.iter().all(|g| *g <= Duration::from_millis(400)));
        assert_eq!(h.metrics.snapshot().empty_reads as usize, times.len());
    }

    #[tokio::test(start_paused = true)]
    async fn changes_reset_idle_backoff() {
        let observer = Arc::new(RecordingObserver::default());
        let idle = |c: &str| Ok(FeedPage::NotModified { continuation: c.into() });
        let h = harness(
            vec![idle("lsn:0"), idle("lsn:0"), Ok(changes(1, 1, "lsn:1")), idle("lsn:1")],
            observer,
        )
        .await;

        run_for(h.processor, Duration::from_secs(1)).await;

        let times = h.reader.call_times();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        // 100ms, 200ms, then immediate read after the batch, then 100ms again.
        assert_eq!(gaps[0], Duration::from_millis(100));
        assert_eq!(gaps[1], Duration::from_millis(200));
        assert_eq!(gaps[2], Duration::ZERO);
        assert_eq!(gaps[3], Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_id_ignores_idle_position_moves() {
        let idle = |c: &str| Ok(FeedPage::NotModified { continuation: c.into() });

        let observer = Arc::new(RecordingObserver::default());
        let h = harness(vec![idle("lsn:0"), Ok(changes(2, 1, "lsn:2"))], observer.clone()).await;
        h.store.fail_replace(vec![StoreError::conflict("p-0")]);
        h.processor.run(CancellationToken::new()).await;
        assert_eq!(h.reader.requests()[1].continuation, Some("lsn:0".into()));

        // Fresh run against the same unconfirmed lease reads the batch directly.
        let replay = Arc::new(RecordingObserver::default());
        let again = harness(vec![Ok(changes(2, 1, "lsn:2"))], replay.clone()).await;
        run_for(again.processor, Duration::from_millis(50)).await;

        let first = &observer.batches()[0];
        let second = &replay.batches()[0];
        assert_eq!(first.start, None);
        assert_eq!(first.id, second.id);
    }

    struct StopDuringProcessing {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Observer for StopDuringProcessing {
        async fn process_changes(
            &self,
            _ctx: &ObserverContext,
            _batch: &ChangeBatch,
        ) -> Result<(), ObserverError> {
            self.cancel.cancel();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_processing_skips_checkpoint() {
        let cancel = CancellationToken::new();
        let observer = Arc::new(StopDuringProcessing {
            cancel: cancel.clone(),
        });
        let h = harness(vec![Ok(changes(1, 1, "lsn:1"))], observer).await;

        assert_eq!(h.processor.run(cancel).await, FeedOutcome::Cancelled);
        assert_eq!(h.store.replace_calls(), 0);
        assert_eq!(h.metrics.snapshot().batches_delivered, 1);
    }
}

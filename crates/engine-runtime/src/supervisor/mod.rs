use crate::supervisor::{
    config::SupervisorConfig,
    handle::SupervisorHandle,
    state::{StopOutcome, StopReason, SupervisorState},
};
use engine_core::{
    connectors::{
        feed::FeedReader,
        observer::{CloseReason, Observer},
    },
    error::ObserverError,
    metrics::Metrics,
    monitor::{HealthMonitor, HealthRecord, MonitoredOperation},
    state::LeaseStore,
};
use engine_processing::{
    feed::{FeedOutcome, FeedProcessor},
    keeper::{KeeperHandle, spawn_keeper},
    renewer::{LeaseRenewer, RenewOutcome},
    retry::classify_keeper_error,
};
use futures::FutureExt;
use model::Lease;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod config;
pub mod handle;
pub mod state;

/// Result of one of the two partition loops.
enum LoopResult {
    Renewer(Result<RenewOutcome, JoinError>),
    Feed(Result<FeedOutcome, JoinError>),
}

impl LoopResult {
    /// `None` for a plain cancellation.
    fn into_reason(self) -> Option<StopReason> {
        match self {
            LoopResult::Renewer(Ok(RenewOutcome::Cancelled)) => None,
            LoopResult::Renewer(Ok(RenewOutcome::LeaseLost { reason })) => {
                Some(StopReason::LeaseLost(reason))
            }
            LoopResult::Feed(Ok(outcome)) => match outcome {
                FeedOutcome::Cancelled => None,
                FeedOutcome::LeaseLost { reason } => Some(StopReason::LeaseLost(reason)),
                FeedOutcome::ObserverFailed(e) => Some(StopReason::ObserverFailed(e)),
                FeedOutcome::PartitionGone => Some(StopReason::PartitionGone),
                FeedOutcome::ReaderFailed(reason) => Some(StopReason::ReaderFailed(reason)),
            },
            LoopResult::Renewer(Err(e)) => Some(StopReason::TaskFailed(format!("renewer: {e}"))),
            LoopResult::Feed(Err(e)) => Some(StopReason::TaskFailed(format!("feed: {e}"))),
        }
    }
}

/// Owns one partition for the lifetime of an acquired lease.
///
/// `run` opens the observer, then runs the lease renewer and the feed
/// processor side by side. Whichever loop ends first decides the stop reason;
/// its task cancels the sibling on the way out so nothing is read, delivered or
/// checkpointed after the lease is known to be lost. The observer is closed
/// exactly once after a successful open.
pub struct PartitionSupervisor {
    lease: Lease,
    store: Arc<dyn LeaseStore>,
    reader: Arc<dyn FeedReader>,
    observer: Arc<dyn Observer>,
    config: SupervisorConfig,
    metrics: Metrics,
    monitor: Arc<dyn HealthMonitor>,
    state: watch::Sender<SupervisorState>,
    cancel: CancellationToken,
}

impl PartitionSupervisor {
    pub fn new(
        lease: Lease,
        store: Arc<dyn LeaseStore>,
        reader: Arc<dyn FeedReader>,
        observer: Arc<dyn Observer>,
        config: SupervisorConfig,
        monitor: Arc<dyn HealthMonitor>,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::NotStarted);
        Self {
            lease,
            store,
            reader,
            observer,
            config,
            metrics: Metrics::new(),
            monitor,
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn partition_id(&self) -> &str {
        &self.lease.partition_id
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::new(
            &self.lease.partition_id,
            self.state.subscribe(),
            self.cancel.clone(),
        )
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Runs the partition until `shutdown` fires, the handle cancels it, the
    /// lease is lost, or the observer or reader fail.
    pub async fn run(self, shutdown: CancellationToken) -> StopOutcome {
        let partition_id = self.lease.partition_id.clone();
        let (keeper, keeper_task) = spawn_keeper(self.store.clone(), self.lease.clone());

        if shutdown.is_cancelled() || self.cancel.is_cancelled() {
            info!(partition = %partition_id, "Stop requested before start");
            return self
                .finish(StopReason::Shutdown, None, keeper, keeper_task)
                .await;
        }

        if let Err(err) = self.open(&partition_id).await {
            error!(partition = %partition_id, error = %err, "Observer failed to open");
            self.monitor.inspect(HealthRecord::error(
                &partition_id,
                MonitoredOperation::Open,
                err.to_string(),
            ));
            return self
                .finish(StopReason::OpenFailed(err), None, keeper, keeper_task)
                .await;
        }

        self.state.send_replace(SupervisorState::Running);
        info!(
            partition = %partition_id,
            owner = ?self.lease.owner,
            "Partition supervisor running"
        );

        let reason = self.run_loops(&keeper, &shutdown).await;

        let close_reason = reason.close_reason();
        let close_error = self.close(&partition_id, close_reason).await;
        self.finish(reason, Some((close_reason, close_error)), keeper, keeper_task)
            .await
    }

    async fn open(&self, partition_id: &str) -> Result<(), ObserverError> {
        match AssertUnwindSafe(self.observer.open(partition_id))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ObserverError::new("observer panicked in open")),
        }
    }

    async fn run_loops(&self, keeper: &KeeperHandle, shutdown: &CancellationToken) -> StopReason {
        let renew_cancel = self.cancel.child_token();
        let feed_cancel = self.cancel.child_token();

        let renewer = LeaseRenewer::new(
            keeper.clone(),
            self.config.renewer.clone(),
            self.metrics.clone(),
            self.monitor.clone(),
        );
        let processor = FeedProcessor::new(
            keeper.clone(),
            self.reader.clone(),
            self.observer.clone(),
            self.config.feed.clone(),
            self.metrics.clone(),
            self.monitor.clone(),
        );

        let mut renew_task: JoinHandle<RenewOutcome> = tokio::spawn({
            let token = renew_cancel.clone();
            let sibling = feed_cancel.clone();
            async move {
                let outcome = renewer.run(token).await;
                sibling.cancel();
                outcome
            }
        });
        let mut feed_task: JoinHandle<FeedOutcome> = tokio::spawn({
            let token = feed_cancel.clone();
            let sibling = renew_cancel.clone();
            async move {
                let outcome = processor.run(token).await;
                sibling.cancel();
                outcome
            }
        });

        let first = loop {
            tokio::select! {
                result = &mut renew_task => break LoopResult::Renewer(result),
                result = &mut feed_task => break LoopResult::Feed(result),
                _ = shutdown.cancelled(), if !self.cancel.is_cancelled() => {
                    info!(partition = %self.lease.partition_id, "Shutdown requested");
                    self.cancel.cancel();
                }
            }
        };

        self.state.send_replace(SupervisorState::Stopping);

        // A panicked task never reached its sibling.cancel().
        renew_cancel.cancel();
        feed_cancel.cancel();

        let second = match first {
            LoopResult::Renewer(_) => LoopResult::Feed(feed_task.await),
            LoopResult::Feed(_) => LoopResult::Renewer(renew_task.await),
        };

        first
            .into_reason()
            .or_else(|| second.into_reason())
            .unwrap_or(StopReason::Shutdown)
    }

    async fn close(&self, partition_id: &str, reason: CloseReason) -> Option<ObserverError> {
        let result = match AssertUnwindSafe(self.observer.close(partition_id, reason))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ObserverError::new("observer panicked in close")),
        };

        match result {
            Ok(()) => None,
            Err(err) => {
                warn!(partition = %partition_id, error = %err, "Observer failed to close");
                self.monitor.inspect(HealthRecord::warning(
                    partition_id,
                    MonitoredOperation::Close,
                    err.to_string(),
                ));
                Some(err)
            }
        }
    }

    /// Releases the lease if appropriate, stops the keeper and publishes `Stopped`.
    async fn finish(
        self,
        reason: StopReason,
        closed: Option<(CloseReason, Option<ObserverError>)>,
        keeper: KeeperHandle,
        keeper_task: JoinHandle<Lease>,
    ) -> StopOutcome {
        let partition_id = self.lease.partition_id.clone();
        let released = if self.config.release_on_stop && reason.releases_lease() {
            self.release(&partition_id, &keeper).await
        } else {
            false
        };

        let last_seen = keeper.current();
        drop(keeper);
        let lease = keeper_task.await.unwrap_or(last_seen);

        let (close_reason, close_error) = match closed {
            Some((close_reason, close_error)) => (Some(close_reason), close_error),
            None => (None, None),
        };

        if reason.is_failure() {
            warn!(partition = %partition_id, reason = %reason, released, "Partition supervisor stopped");
        } else {
            info!(partition = %partition_id, released, "Partition supervisor stopped");
        }
        self.state
            .send_replace(SupervisorState::Stopped(reason.clone()));

        StopOutcome {
            partition_id,
            reason,
            close_reason,
            close_error,
            lease,
            released,
            metrics: self.metrics.snapshot(),
        }
    }

    async fn release(&self, partition_id: &str, keeper: &KeeperHandle) -> bool {
        let result = self
            .config
            .renewer
            .retry
            .run(
                || keeper.release(),
                classify_keeper_error,
                &CancellationToken::new(),
            )
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                let message = err
                    .into_inner()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "release cancelled".to_string());
                warn!(partition = %partition_id, error = %message, "Failed to release lease");
                self.monitor.inspect(HealthRecord::warning(
                    partition_id,
                    MonitoredOperation::Release,
                    message,
                ));
                false
            }
        }
    }
}

use crate::{error::CheckpointError, keeper::KeeperHandle, retry::classify_keeper_error};
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use model::{ContinuationToken, Lease};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Persists the read position of one partition.
///
/// Unavailable stores are retried; a conflict or a missing lease fails fast,
/// since either means another worker may already be processing the partition.
pub struct PartitionCheckpointer {
    keeper: KeeperHandle,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl PartitionCheckpointer {
    pub fn new(keeper: KeeperHandle, retry: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            keeper,
            retry,
            metrics,
        }
    }

    pub async fn checkpoint(
        &self,
        continuation: ContinuationToken,
        cancel: &CancellationToken,
    ) -> Result<Lease, CheckpointError> {
        let partition_id = self.keeper.current().partition_id;
        let metrics = self.metrics.clone();

        let result = self
            .retry
            .run(
                || self.keeper.checkpoint(continuation.clone()),
                |err| {
                    let disposition = classify_keeper_error(err);
                    if disposition == RetryDisposition::Retry {
                        metrics.increment_retries(1);
                        warn!(partition = %partition_id, error = %err, "Checkpoint failed, retrying");
                    }
                    disposition
                },
                cancel,
            )
            .await;

        match result {
            Ok(lease) => {
                self.metrics.increment_checkpoints();
                debug!(
                    partition = %partition_id,
                    continuation = %continuation,
                    "Checkpoint written"
                );
                Ok(lease)
            }
            Err(RetryError::Cancelled) => Err(CheckpointError::Cancelled),
            Err(RetryError::Fatal(err)) | Err(RetryError::AttemptsExceeded(err)) => {
                self.metrics.increment_failures(1);
                Err(CheckpointError::LeaseLost {
                    partition_id,
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keeper::spawn_keeper, test_support::FlakyStore};
    use engine_core::{error::StoreError, state::LeaseStore};
    use std::{sync::Arc, time::Duration};

    fn retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40))
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_store_is_retried() {
        let (store, lease) = FlakyStore::acquired("p-0").await;
        let store = Arc::new(store);
        store.fail_replace(vec![StoreError::Unavailable("throttled".into())]);
        let (keeper, _task) = spawn_keeper(store.clone(), lease);
        let metrics = Metrics::new();
        let checkpointer = PartitionCheckpointer::new(keeper, retry(), metrics.clone());

        let lease = checkpointer
            .checkpoint("lsn:4".into(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(lease.continuation, Some("lsn:4".into()));
        assert_eq!(store.replace_calls(), 2);
        assert_eq!(metrics.snapshot().retry_count, 1);
        assert_eq!(metrics.snapshot().checkpoints, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_fails_fast() {
        let (store, lease) = FlakyStore::acquired("p-0").await;
        let store = Arc::new(store);
        store.fail_replace(vec![StoreError::conflict("p-0")]);
        let (keeper, _task) = spawn_keeper(store.clone(), lease);
        let checkpointer = PartitionCheckpointer::new(keeper, retry(), Metrics::new());

        let err = checkpointer
            .checkpoint("lsn:4".into(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckpointError::LeaseLost { .. }));
        assert_eq!(store.replace_calls(), 1);
        assert!(store.get("p-0").await.unwrap().unwrap().continuation.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_mean_lease_lost() {
        let (store, lease) = FlakyStore::acquired("p-0").await;
        let store = Arc::new(store);
        store.fail_replace(vec![StoreError::Unavailable("down".into()); 3]);
        let (keeper, _task) = spawn_keeper(store.clone(), lease);
        let checkpointer = PartitionCheckpointer::new(keeper, retry(), Metrics::new());

        let err = checkpointer
            .checkpoint("lsn:4".into(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CheckpointError::LeaseLost {
                partition_id: "p-0".into(),
                reason: "Lease store error: Lease store unavailable: down".into(),
            }
        );
        assert_eq!(store.replace_calls(), 3);
    }
}

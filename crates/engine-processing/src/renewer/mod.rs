use crate::{keeper::KeeperHandle, retry::classify_keeper_error};
use config::RenewerConfig;
use engine_core::{
    metrics::Metrics,
    monitor::{HealthMonitor, HealthRecord, MonitoredOperation},
    retry::{RetryDisposition, RetryError},
};
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod config;

/// How a renewal loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Cancelled,
    LeaseLost { reason: String },
}

/// Keeps one lease alive by renewing it on a fixed cadence.
pub struct LeaseRenewer {
    keeper: KeeperHandle,
    config: RenewerConfig,
    metrics: Metrics,
    monitor: Arc<dyn HealthMonitor>,
}

impl LeaseRenewer {
    pub fn new(
        keeper: KeeperHandle,
        config: RenewerConfig,
        metrics: Metrics,
        monitor: Arc<dyn HealthMonitor>,
    ) -> Self {
        Self {
            keeper,
            config,
            metrics,
            monitor,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> RenewOutcome {
        let partition_id = self.keeper.current().partition_id;
        info!(
            partition = %partition_id,
            interval_ms = self.config.renew_interval.as_millis() as u64,
            "Lease renewer started"
        );

        let mut delay = self.config.initial_delay;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(partition = %partition_id, "Lease renewer cancelled");
                    return RenewOutcome::Cancelled;
                }
                _ = sleep(delay) => {}
            }
            delay = self.config.renew_interval;

            let metrics = self.metrics.clone();
            let result = self
                .config
                .retry
                .run(
                    || self.keeper.renew(),
                    |err| {
                        let disposition = classify_keeper_error(err);
                        if disposition == RetryDisposition::Retry {
                            metrics.increment_retries(1);
                            warn!(partition = %partition_id, error = %err, "Lease renewal failed, retrying");
                        }
                        disposition
                    },
                    &cancel,
                )
                .await;

            match result {
                Ok(lease) => {
                    self.metrics.increment_renewals();
                    debug!(partition = %partition_id, renewed_at = %lease.timestamp, "Lease renewed");
                }
                Err(RetryError::Cancelled) => return RenewOutcome::Cancelled,
                Err(RetryError::Fatal(err)) | Err(RetryError::AttemptsExceeded(err)) => {
                    let reason = err.to_string();
                    warn!(partition = %partition_id, error = %reason, "Lease lost during renewal");
                    self.metrics.increment_failures(1);
                    self.monitor.inspect(HealthRecord::warning(
                        &partition_id,
                        MonitoredOperation::Renew,
                        format!("lease lost: {reason}"),
                    ));
                    return RenewOutcome::LeaseLost { reason };
                }
            }
        }
    }
}

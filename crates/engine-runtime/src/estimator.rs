use engine_config::settings::validated::ValidatedSettings;
use engine_core::{
    connectors::estimate::{LagEstimator, LagHandler, LagReport, PartitionLag},
    error::{ReadError, StoreError},
    monitor::{HealthMonitor, HealthRecord, MonitoredOperation, TracingHealthMonitor},
    state::LeaseStore,
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically measures how far every leased partition is behind its feed.
///
/// Reads the same lease store the supervisors write, so it can run in any
/// process, owning partitions or not. It never writes a lease.
pub struct FeedEstimator {
    store: Arc<dyn LeaseStore>,
    estimator: Arc<dyn LagEstimator>,
    handler: Arc<dyn LagHandler>,
    period: Duration,
    monitor: Arc<dyn HealthMonitor>,
}

impl FeedEstimator {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        estimator: Arc<dyn LagEstimator>,
        handler: Arc<dyn LagHandler>,
        period: Duration,
    ) -> Self {
        Self {
            store,
            estimator,
            handler,
            period,
            monitor: Arc::new(TracingHealthMonitor),
        }
    }

    pub fn from_settings(
        store: Arc<dyn LeaseStore>,
        estimator: Arc<dyn LagEstimator>,
        handler: Arc<dyn LagHandler>,
        settings: &ValidatedSettings,
    ) -> Self {
        Self::new(store, estimator, handler, settings.estimation_period)
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn HealthMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One pass over the store. Partitions reported gone are left out; other
    /// estimation failures keep the partition with an unknown lag.
    pub async fn estimate(&self) -> Result<LagReport, StoreError> {
        let leases = self.store.list().await?;
        let mut partitions = Vec::with_capacity(leases.len());

        for lease in leases {
            let estimated_lag = match self
                .estimator
                .estimate_lag(&lease.partition_id, lease.continuation.as_ref())
                .await
            {
                Ok(lag) => Some(lag),
                Err(ReadError::PartitionGone { .. }) => {
                    debug!(partition = %lease.partition_id, "Partition gone, left out of lag report");
                    continue;
                }
                Err(err) => {
                    warn!(partition = %lease.partition_id, error = %err, "Lag estimation failed");
                    self.monitor.inspect(HealthRecord::warning(
                        &lease.partition_id,
                        MonitoredOperation::EstimateLag,
                        err.to_string(),
                    ));
                    None
                }
            };

            partitions.push(PartitionLag {
                partition_id: lease.partition_id,
                owner: lease.owner,
                continuation: lease.continuation,
                estimated_lag,
            });
        }

        Ok(LagReport::new(partitions))
    }

    /// Estimates and reports every `period` until `cancel` fires. A failed
    /// pass is logged and the next one runs on schedule.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(period_ms = self.period.as_millis() as u64, "Feed estimator started");

        loop {
            // Estimation only reads, so an in-flight pass may be abandoned.
            let pass = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                pass = self.estimate() => pass,
            };

            match pass {
                Ok(report) => {
                    debug!(
                        partitions = report.partitions.len(),
                        total_lag = report.total_lag(),
                        "Lag estimated"
                    );
                    self.handler.handle_lag(&report).await;
                }
                Err(err) => warn!(error = %err, "Listing leases for lag estimation failed"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.period) => {}
            }
        }

        info!("Feed estimator stopped");
    }
}

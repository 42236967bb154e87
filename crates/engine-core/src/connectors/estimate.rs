use crate::error::ReadError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::ContinuationToken;
use serde::Serialize;

/// Reader capability: how much of a partition is still unread.
#[async_trait]
pub trait LagEstimator: Send + Sync {
    /// Number of changes after `continuation`. `None` means the partition was
    /// never checkpointed, so everything it holds is pending.
    async fn estimate_lag(
        &self,
        partition_id: &str,
        continuation: Option<&ContinuationToken>,
    ) -> Result<u64, ReadError>;
}

/// Estimated backlog of one leased partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionLag {
    pub partition_id: String,
    pub owner: Option<String>,
    pub continuation: Option<ContinuationToken>,
    /// `None` when the estimate could not be obtained on this pass.
    pub estimated_lag: Option<u64>,
}

/// One estimation pass over every lease in the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagReport {
    pub partitions: Vec<PartitionLag>,
    pub at: DateTime<Utc>,
}

impl LagReport {
    pub fn new(partitions: Vec<PartitionLag>) -> Self {
        Self {
            partitions,
            at: Utc::now(),
        }
    }

    /// Sum of the partitions that could be estimated.
    pub fn total_lag(&self) -> u64 {
        self.partitions
            .iter()
            .filter_map(|p| p.estimated_lag)
            .fold(0, u64::saturating_add)
    }

    pub fn get(&self, partition_id: &str) -> Option<&PartitionLag> {
        self.partitions.iter().find(|p| p.partition_id == partition_id)
    }
}

/// Receives every lag report.
#[async_trait]
pub trait LagHandler: Send + Sync {
    async fn handle_lag(&self, report: &LagReport);
}

#[async_trait]
impl<F> LagHandler for F
where
    F: Fn(&LagReport) + Send + Sync,
{
    async fn handle_lag(&self, report: &LagReport) {
        self(report)
    }
}

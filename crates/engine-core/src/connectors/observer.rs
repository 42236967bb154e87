use crate::error::ObserverError;
use async_trait::async_trait;
use model::{ChangeBatch, ContinuationToken};
use serde::Serialize;
use std::{fmt, sync::Arc};

/// Why an observer is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    /// The host is shutting down or the partition was handed back.
    Shutdown,
    /// Ownership could not be confirmed any more.
    LeaseLost,
    /// The observer itself failed while processing.
    ObserverError,
    /// Anything else: partition gone, reader failure, crashed loop.
    Unknown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Shutdown => "Shutdown",
            CloseReason::LeaseLost => "LeaseLost",
            CloseReason::ObserverError => "ObserverError",
            CloseReason::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery metadata handed to [`Observer::process_changes`].
#[derive(Debug, Clone)]
pub struct ObserverContext {
    pub partition_id: String,
    pub owner: Option<String>,
    pub batch_id: String,
    /// Position that will be checkpointed once the call returns `Ok`.
    pub continuation: ContinuationToken,
}

/// User logic consuming one partition.
///
/// Calls for one partition never overlap: `open` happens first, each
/// `process_changes` returns before the next one starts, and `close` is called
/// exactly once after a successful `open`. A batch is redelivered if the
/// process crashes before its checkpoint lands, so processing must be
/// idempotent.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn open(&self, _partition_id: &str) -> Result<(), ObserverError> {
        Ok(())
    }

    async fn process_changes(
        &self,
        ctx: &ObserverContext,
        batch: &ChangeBatch,
    ) -> Result<(), ObserverError>;

    async fn close(&self, _partition_id: &str, _reason: CloseReason) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Creates one observer per partition supervisor.
pub trait ObserverFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Observer>;
}

impl<F> ObserverFactory for F
where
    F: Fn() -> Arc<dyn Observer> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Observer> {
        self()
    }
}

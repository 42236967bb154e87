use engine_core::{
    connectors::observer::CloseReason, error::ObserverError, metrics::MetricsSnapshot,
};
use model::Lease;
use std::fmt;

/// Lifecycle of a partition supervisor. `Stopped` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    NotStarted,
    Running,
    Stopping,
    Stopped(StopReason),
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::NotStarted => "NotStarted",
            SupervisorState::Running => "Running",
            SupervisorState::Stopping => "Stopping",
            SupervisorState::Stopped(_) => "Stopped",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SupervisorState::Stopped(_))
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Stopped(reason) => write!(f, "Stopped({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Why a supervisor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Cancellation was requested.
    Shutdown,
    /// `Observer::open` failed; nothing else ran.
    OpenFailed(ObserverError),
    /// Ownership could not be confirmed by renewal or checkpoint.
    LeaseLost(String),
    ObserverFailed(ObserverError),
    /// The partition was split or merged away.
    PartitionGone,
    ReaderFailed(String),
    /// A loop task panicked.
    TaskFailed(String),
}

impl StopReason {
    /// Reason reported to `Observer::close`.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            StopReason::Shutdown => CloseReason::Shutdown,
            StopReason::LeaseLost(_) => CloseReason::LeaseLost,
            StopReason::ObserverFailed(_) => CloseReason::ObserverError,
            StopReason::OpenFailed(_)
            | StopReason::PartitionGone
            | StopReason::ReaderFailed(_)
            | StopReason::TaskFailed(_) => CloseReason::Unknown,
        }
    }

    /// A lost lease belongs to someone else and a gone partition is cleaned up
    /// by the partition manager; every other lease is handed back.
    pub fn releases_lease(&self) -> bool {
        !matches!(self, StopReason::LeaseLost(_) | StopReason::PartitionGone)
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, StopReason::Shutdown)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => f.write_str("shutdown"),
            StopReason::OpenFailed(e) => write!(f, "open failed: {e}"),
            StopReason::LeaseLost(reason) => write!(f, "lease lost: {reason}"),
            StopReason::ObserverFailed(e) => write!(f, "observer failed: {e}"),
            StopReason::PartitionGone => f.write_str("partition gone"),
            StopReason::ReaderFailed(reason) => write!(f, "reader failed: {reason}"),
            StopReason::TaskFailed(reason) => write!(f, "task failed: {reason}"),
        }
    }
}

/// Everything known about a supervisor once it stopped.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub partition_id: String,
    pub reason: StopReason,
    /// `None` when `open` never succeeded, so `close` was not called.
    pub close_reason: Option<CloseReason>,
    pub close_error: Option<ObserverError>,
    /// Last lease version this supervisor saw.
    pub lease: Lease,
    pub released: bool,
    pub metrics: MetricsSnapshot,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, sync::Mutex};
use tracing::{error, info, warn};

/// Step of a partition's lifecycle a health record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitoredOperation {
    Open,
    ReadChanges,
    ProcessChanges,
    Checkpoint,
    Renew,
    Close,
    Release,
    EstimateLag,
}

impl MonitoredOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoredOperation::Open => "open",
            MonitoredOperation::ReadChanges => "read_changes",
            MonitoredOperation::ProcessChanges => "process_changes",
            MonitoredOperation::Checkpoint => "checkpoint",
            MonitoredOperation::Renew => "renew",
            MonitoredOperation::Close => "close",
            MonitoredOperation::Release => "release",
            MonitoredOperation::EstimateLag => "estimate_lag",
        }
    }
}

impl fmt::Display for MonitoredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthSeverity {
    Informational,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub partition_id: String,
    pub operation: MonitoredOperation,
    pub severity: HealthSeverity,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl HealthRecord {
    pub fn new(
        partition_id: impl Into<String>,
        operation: MonitoredOperation,
        severity: HealthSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            operation,
            severity,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn warning(
        partition_id: impl Into<String>,
        operation: MonitoredOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(partition_id, operation, HealthSeverity::Warning, message)
    }

    pub fn error(
        partition_id: impl Into<String>,
        operation: MonitoredOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(partition_id, operation, HealthSeverity::Error, message)
    }
}

/// Receives failures that the engine handles itself but an operator should see,
/// such as a failing `close` or a lease that could not be released.
pub trait HealthMonitor: Send + Sync {
    fn inspect(&self, record: HealthRecord);
}

/// Default monitor: forwards every record to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHealthMonitor;

impl HealthMonitor for TracingHealthMonitor {
    fn inspect(&self, record: HealthRecord) {
        match record.severity {
            HealthSeverity::Informational => info!(
                partition = %record.partition_id,
                operation = %record.operation,
                "{}", record.message
            ),
            HealthSeverity::Warning => warn!(
                partition = %record.partition_id,
                operation = %record.operation,
                "{}", record.message
            ),
            HealthSeverity::Error => error!(
                partition = %record.partition_id,
                operation = %record.operation,
                "{}", record.message
            ),
        }
    }
}

/// Keeps every record in memory. Handy for tests and for a status command.
#[derive(Debug, Default)]
pub struct RecordingHealthMonitor {
    records: Mutex<Vec<HealthRecord>>,
}

impl RecordingHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<HealthRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HealthMonitor for RecordingHealthMonitor {
    fn inspect(&self, record: HealthRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
